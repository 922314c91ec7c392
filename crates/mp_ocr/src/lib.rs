//! OCR engines behind the `mp_core::OcrEngine` capability.

pub mod models;

pub use models::{create_engine, DummyEngine, TesseractEngine};

pub mod prelude {
    pub use super::models::create_engine;
    pub use mp_core::{OcrEngine, OcrOptions, Result, Error};
}

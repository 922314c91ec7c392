use std::sync::Arc;
use mp_core::config::OcrConfig;
use mp_core::{Error, OcrEngine, Result};

pub mod dummy;
pub mod tesseract;

pub use dummy::DummyEngine;
pub use tesseract::TesseractEngine;

/// Build the engine named by `config.engine`.
pub fn create_engine(config: &OcrConfig) -> Result<Arc<dyn OcrEngine>> {
    match config.engine.to_lowercase().as_str() {
        "tesseract" => Ok(Arc::new(TesseractEngine::new(config.binary.clone()))),
        "dummy" => Ok(Arc::new(DummyEngine::default())),
        other => Err(Error::Config(format!(
            "Unknown OCR engine: {}. Available engines: tesseract, dummy",
            other
        ))),
    }
}

pub mod config;
pub mod error;
pub mod fetch;
pub mod ocr;
pub mod storage;
pub mod types;

pub use config::{AuthMode, Config, FeishuConfig, FieldMapping};
pub use error::{EnrichmentError, Error, Result};
pub use fetch::ByteFetcher;
pub use ocr::{OcrEngine, OcrOptions};
pub use storage::RecordStorage;
pub use types::{
    ArticleDocument, EnrichmentStats, ImageRef, OcrOutcome, OcrResult, ProcessedArticle,
    TableRecord,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrOptions {
    /// Tesseract language pack, e.g. `chi_sim` or `eng`
    pub language: String,
    /// Page segmentation mode; 6 assumes a single uniform block of text
    pub psm: u8,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            language: "chi_sim".to_string(),
            psm: 6,
        }
    }
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Recognize text in an encoded image. The returned text is untrimmed.
    async fn recognize(&self, image: &[u8], options: &OcrOptions) -> Result<String>;
}

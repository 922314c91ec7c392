use std::fmt;
use mp_core::{OcrEngine, OcrOptions, Result};

/// Returns a fixed text for every image; used for dry runs and tests.
pub struct DummyEngine {
    text: String,
}

impl DummyEngine {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Default for DummyEngine {
    fn default() -> Self {
        Self::new("dummy ocr text")
    }
}

impl fmt::Debug for DummyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyEngine").field("text", &self.text).finish()
    }
}

#[async_trait::async_trait]
impl OcrEngine for DummyEngine {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn recognize(&self, _image: &[u8], _options: &OcrOptions) -> Result<String> {
        Ok(self.text.clone())
    }
}

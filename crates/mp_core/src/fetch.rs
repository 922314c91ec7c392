use async_trait::async_trait;
use crate::Result;

/// Source of article markup and image bytes.
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Fetch a page and decode it as UTF-8 markup
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let bytes = self.fetch_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

use std::sync::Arc;

use mp_core::config::Config;
use mp_core::{
    ByteFetcher, EnrichmentStats, Error, FieldMapping, OcrEngine, ProcessedArticle,
    RecordStorage, Result,
};
use tokio::time::Instant;
use tracing::{info, warn};
use url::Url;

use crate::assembler::build_record;
use crate::enrichment::ImageEnricher;
use crate::extractor::Extractor;

/// Sequences fetch → extract → enrich → persist for one article at a time.
pub struct ArticlePipeline {
    fetcher: Arc<dyn ByteFetcher>,
    extractor: Extractor,
    enricher: ImageEnricher,
    storage: Option<Arc<dyn RecordStorage>>,
    fields: FieldMapping,
}

impl ArticlePipeline {
    pub fn new(
        fetcher: Arc<dyn ByteFetcher>,
        extractor: Extractor,
        enricher: ImageEnricher,
        storage: Option<Arc<dyn RecordStorage>>,
        fields: FieldMapping,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            enricher,
            storage,
            fields,
        }
    }

    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn ByteFetcher>,
        ocr: Arc<dyn OcrEngine>,
        storage: Option<Arc<dyn RecordStorage>>,
    ) -> Result<Self> {
        let extractor = Extractor::from_config(config)?;
        let enricher = ImageEnricher::from_config(config, fetcher.clone(), ocr)?;
        Ok(Self::new(
            fetcher,
            extractor,
            enricher,
            storage,
            config.feishu.fields.clone(),
        ))
    }

    pub fn storage_enabled(&self) -> bool {
        self.storage.is_some()
    }

    pub async fn process(
        &self,
        url: &str,
        include_ocr: bool,
        download_images: bool,
    ) -> Result<ProcessedArticle> {
        self.process_until(url, include_ocr, download_images, None).await
    }

    /// Like `process`, but stops enriching images once `deadline` passes.
    pub async fn process_until(
        &self,
        url: &str,
        include_ocr: bool,
        download_images: bool,
        deadline: Option<Instant>,
    ) -> Result<ProcessedArticle> {
        validate_url(url)?;
        info!("📰 Fetching article: {}", url);

        let html = self.fetcher.fetch_text(url).await?;
        let mut document = self.extractor.extract(url, &html)?;
        info!("📝 Extracted title: {}", document.title);
        info!("📏 Content length: {} chars", document.content.chars().count());
        info!("🖼️ Found {} images", document.images.len());

        let stats = if include_ocr && download_images {
            let report = self.enricher.enrich_document(&mut document, deadline).await;
            if let Some(err) = report.error {
                return Err(err.into());
            }
            report.stats
        } else {
            EnrichmentStats {
                images_found: document.images.len(),
                ..Default::default()
            }
        };

        Ok(ProcessedArticle { document, stats })
    }

    /// Write the article to the table store and return the remote record id.
    /// Enrichment failures never block persistence.
    pub async fn persist(&self, article: &ProcessedArticle) -> Result<String> {
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| Error::Config("Table-store persistence is not enabled".to_string()))?;

        if article.stats.images_found > 0 && article.stats.images_enriched == 0 {
            warn!("Persisting {} without any OCR content", article.document.url);
        }

        storage.ensure_ready().await?;
        let record = build_record(&article.document, &self.fields);
        let record_id = storage.store_record(&record).await?;
        info!("💾 Stored {} in {} as {}", article.document.title, storage.name(), record_id);
        Ok(record_id)
    }

    pub async fn process_and_persist(
        &self,
        url: &str,
        include_ocr: bool,
        download_images: bool,
    ) -> Result<(ProcessedArticle, String)> {
        let article = self.process(url, include_ocr, download_images).await?;
        let record_id = self.persist(&article).await?;
        Ok((article, record_id))
    }
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidUrl(format!("unsupported scheme {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://mp.weixin.qq.com/s/abc").is_ok());
        assert!(matches!(validate_url("mp.weixin.qq.com/s/abc"), Err(Error::InvalidUrl(_))));
        assert!(matches!(validate_url("ftp://host/file"), Err(Error::InvalidUrl(_))));
    }
}

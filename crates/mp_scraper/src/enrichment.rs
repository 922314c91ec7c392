//! Download-then-recognize for every image of a document.
//!
//! Each image is independent: a failed download is logged and skipped, a
//! failed recognition becomes an `OcrOutcome::Failed` entry. Only the
//! abort-on-error switch or a caller deadline stops the batch early.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use mp_core::config::Config;
use mp_core::{
    ArticleDocument, ByteFetcher, EnrichmentError, EnrichmentStats, Error, ImageRef, OcrEngine,
    OcrOptions, OcrOutcome, OcrResult, Result,
};
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

const DEFAULT_EXTENSION: &str = ".jpg";

/// File extension (with the dot) taken from the URL path, ignoring the query.
pub fn image_extension(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(|c| c == '?' || c == '#').next().unwrap_or_default().to_string(),
    };
    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!(".{}", ext.to_lowercase()),
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

const MAX_KEY_LEN: usize = 64;

/// Directory name for one article's images: the `sn` query parameter when
/// present, else the last path segment, reduced to `[A-Za-z0-9_-]`.
pub fn article_key(url: &str) -> String {
    let raw = match url::Url::parse(url) {
        Ok(parsed) => parsed
            .query_pairs()
            .find(|(k, v)| k == "sn" && !v.is_empty())
            .map(|(_, v)| v.into_owned())
            .or_else(|| {
                parsed
                    .path_segments()
                    .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                    .map(str::to_string)
            })
            .unwrap_or_default(),
        Err(_) => String::new(),
    };
    let key: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_KEY_LEN)
        .collect();
    if key.is_empty() {
        "article".to_string()
    } else {
        key
    }
}

#[derive(Debug, Default)]
pub struct EnrichmentReport {
    pub stats: EnrichmentStats,
    /// The failure that halted the batch when abort-on-error is set
    pub error: Option<EnrichmentError>,
}

pub struct ImageEnricher {
    fetcher: Arc<dyn ByteFetcher>,
    ocr: Arc<dyn OcrEngine>,
    options: OcrOptions,
    output_dir: PathBuf,
    prefix: String,
    suffix: String,
    delay: Duration,
    concurrency: usize,
    continue_on_error: bool,
}

impl ImageEnricher {
    /// Creates the output directory if it does not exist yet.
    pub fn new(
        fetcher: Arc<dyn ByteFetcher>,
        ocr: Arc<dyn OcrEngine>,
        options: OcrOptions,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let output_dir = output_dir.into();
        if !output_dir.exists() {
            std::fs::create_dir_all(&output_dir)?;
            info!("📁 Created image directory {}", output_dir.display());
        }
        Ok(Self {
            fetcher,
            ocr,
            options,
            output_dir,
            prefix: "image_".to_string(),
            suffix: String::new(),
            delay: Duration::from_secs(1),
            concurrency: 1,
            continue_on_error: true,
        })
    }

    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn ByteFetcher>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Result<Self> {
        Ok(Self::new(fetcher, ocr, config.ocr.options(), &config.images.output_dir)?
            .with_file_naming(&config.images.filename_prefix, &config.images.filename_suffix)
            .with_delay(config.http.delay())
            .with_concurrency(config.images.concurrency)
            .with_continue_on_error(config.images.continue_on_error))
    }

    pub fn with_file_naming(mut self, prefix: &str, suffix: &str) -> Self {
        self.prefix = prefix.to_string();
        self.suffix = suffix.to_string();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// `prefix + index + suffix + extension`, index 1-based.
    pub fn file_name(&self, index: usize, url: &str) -> String {
        format!("{}{}{}{}", self.prefix, index, self.suffix, image_extension(url))
    }

    /// Where the images of the article at `url` are written.
    pub fn article_dir(&self, url: &str) -> PathBuf {
        self.output_dir.join(article_key(url))
    }

    /// Download, store into `dir` and recognize one image.
    pub async fn enrich_one(
        &self,
        dir: &Path,
        index: usize,
        image: &ImageRef,
    ) -> std::result::Result<OcrResult, EnrichmentError> {
        info!("🖼️ Processing image {}: {}", index, image.src);

        let bytes = self
            .fetcher
            .fetch_bytes(&image.src)
            .await
            .map_err(|e| EnrichmentError::Download {
                url: image.src.clone(),
                cause: e.to_string(),
            })?;

        let path = dir.join(self.file_name(index, &image.src));
        let stored = match tokio::fs::create_dir_all(dir).await {
            Ok(()) => tokio::fs::write(&path, &bytes).await,
            Err(e) => Err(e),
        };
        stored.map_err(|e| EnrichmentError::Store {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;
        info!("✅ Downloaded image {}", path.display());

        let outcome = match self.ocr.recognize(&bytes, &self.options).await {
            Ok(raw) => OcrOutcome::from_raw(&raw),
            Err(Error::Ocr(cause)) => OcrOutcome::failed(cause),
            Err(e) => OcrOutcome::failed(e),
        };
        match &outcome {
            OcrOutcome::Text { .. } => info!("🔍 OCR succeeded for {}", path.display()),
            OcrOutcome::Empty => warn!("OCR result empty for {}", path.display()),
            OcrOutcome::Failed { cause } => warn!("OCR failed for {}: {}", path.display(), cause),
        }

        Ok(OcrResult {
            index,
            image_url: image.src.clone(),
            local_path: path.display().to_string(),
            outcome,
            alt: image.alt.clone(),
            title: image.title.clone(),
        })
    }

    /// Enrich every image of `document`, appending to its `ocr_results`.
    pub async fn enrich_document(
        &self,
        document: &mut ArticleDocument,
        deadline: Option<Instant>,
    ) -> EnrichmentReport {
        let mut report = EnrichmentReport {
            stats: EnrichmentStats {
                images_found: document.images.len(),
                ..Default::default()
            },
            error: None,
        };

        let dir = self.article_dir(&document.url);
        if self.concurrency > 1 {
            self.enrich_parallel(&dir, document, deadline, &mut report).await;
        } else {
            self.enrich_sequential(&dir, document, deadline, &mut report).await;
        }

        info!(
            "📊 Enriched {}/{} images ({} failed{})",
            report.stats.images_enriched,
            report.stats.images_found,
            report.stats.images_failed,
            if report.stats.halted { ", halted" } else { "" }
        );
        report
    }

    /// Returns false when the batch must stop.
    fn record(
        &self,
        outcome: std::result::Result<OcrResult, EnrichmentError>,
        results: &mut Vec<OcrResult>,
        report: &mut EnrichmentReport,
    ) -> bool {
        match outcome {
            Ok(result) => {
                report.stats.images_enriched += 1;
                results.push(result);
                true
            }
            Err(e) => {
                report.stats.images_failed += 1;
                warn!("❌ {}", e);
                if self.continue_on_error {
                    true
                } else {
                    report.stats.halted = true;
                    report.error = Some(e);
                    false
                }
            }
        }
    }

    async fn enrich_sequential(
        &self,
        dir: &Path,
        document: &mut ArticleDocument,
        deadline: Option<Instant>,
        report: &mut EnrichmentReport,
    ) {
        let total = document.images.len();
        for (i, image) in document.images.iter().enumerate() {
            let index = i + 1;
            let attempt = self.enrich_one(dir, index, image);
            let outcome = match deadline {
                Some(deadline) => match timeout_at(deadline, attempt).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!("⏱️ Deadline reached, skipping images {}..={}", index, total);
                        report.stats.halted = true;
                        break;
                    }
                },
                None => attempt.await,
            };

            let succeeded = outcome.is_ok();
            if !self.record(outcome, &mut document.ocr_results, report) {
                break;
            }
            if succeeded && index < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
    }

    /// Bounded pool of `concurrency` in-flight images. `buffered` yields in
    /// input order, so results stay sorted by image index.
    async fn enrich_parallel(
        &self,
        dir: &Path,
        document: &mut ArticleDocument,
        deadline: Option<Instant>,
        report: &mut EnrichmentReport,
    ) {
        let mut results = Vec::new();
        {
            let images: Vec<(usize, ImageRef)> = document
                .images
                .iter()
                .cloned()
                .enumerate()
                .map(|(i, image)| (i + 1, image))
                .collect();
            let mut pending = stream::iter(images)
                .map(|(index, image)| async move { self.enrich_one(dir, index, &image).await })
                .buffered(self.concurrency);

            loop {
                let next = match deadline {
                    Some(deadline) => match timeout_at(deadline, pending.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            warn!("⏱️ Deadline reached, dropping in-flight images");
                            report.stats.halted = true;
                            break;
                        }
                    },
                    None => pending.next().await,
                };
                let Some(outcome) = next else { break };
                if !self.record(outcome, &mut results, report) {
                    break;
                }
            }
        }
        results.sort_by_key(|r| r.index);
        document.ocr_results.extend(results);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_key() {
        assert_eq!(article_key("https://mp.weixin.qq.com/s/Abc-12_x"), "Abc-12_x");
        assert_eq!(
            article_key("https://mp.weixin.qq.com/s?__biz=MzA&mid=1&idx=1&sn=9f8e7d#rd"),
            "9f8e7d"
        );
        assert_eq!(article_key("https://mp.weixin.qq.com/s/%E4%B8%AD/"), "E4B8AD");
        assert_eq!(article_key("https://mp.weixin.qq.com/"), "article");
        assert_eq!(article_key("not a url"), "article");
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("https://cdn.cn/a/pic.PNG?x=1"), ".png");
        assert_eq!(image_extension("https://cdn.cn/a/pic.jpeg#frag"), ".jpeg");
        assert_eq!(
            image_extension("https://mmbiz.qpic.cn/mmbiz_jpg/abc/640?wx_fmt=jpeg"),
            ".jpg"
        );
        assert_eq!(image_extension("https://cdn.cn/v1.2/photo"), ".jpg");
        assert_eq!(image_extension("https://cdn.cn/trailing."), ".jpg");
        assert_eq!(image_extension("not a url/x.gif?y"), ".gif");
    }
}

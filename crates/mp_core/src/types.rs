use serde::{Deserialize, Serialize};

pub const TITLE_NOT_FOUND: &str = "未找到标题";
pub const CONTENT_NOT_FOUND: &str = "未找到正文内容";
pub const OCR_EMPTY: &str = "OCR识别结果为空";
pub const OCR_FAILED_PREFIX: &str = "OCR识别失败";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
    pub alt: String,
    pub title: String,
}

/// Outcome of running recognition over one downloaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OcrOutcome {
    Text { text: String },
    Empty,
    Failed { cause: String },
}

impl OcrOutcome {
    /// Trims the raw engine output; blank output becomes `Empty`.
    pub fn from_raw(raw: &str) -> Self {
        let text = raw.trim();
        if text.is_empty() {
            OcrOutcome::Empty
        } else {
            OcrOutcome::Text { text: text.to_string() }
        }
    }

    pub fn failed(cause: impl ToString) -> Self {
        OcrOutcome::Failed { cause: cause.to_string() }
    }

    /// Legacy string form, as written into the persisted content.
    pub fn render(&self) -> String {
        match self {
            OcrOutcome::Text { text } => text.clone(),
            OcrOutcome::Empty => OCR_EMPTY.to_string(),
            OcrOutcome::Failed { cause } => format!("{}: {}", OCR_FAILED_PREFIX, cause),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrResult {
    /// 1-based position of the originating image in the document.
    pub index: usize,
    pub image_url: String,
    pub local_path: String,
    pub outcome: OcrOutcome,
    pub alt: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleDocument {
    pub url: String,
    pub title: String,
    pub content: String,
    pub account_name: String,
    pub publish_date: String,
    pub images: Vec<ImageRef>,
    pub ocr_results: Vec<OcrResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentStats {
    pub images_found: usize,
    pub images_enriched: usize,
    pub images_failed: usize,
    /// Set when the batch stopped early (abort-on-error or deadline).
    pub halted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedArticle {
    pub document: ArticleDocument,
    pub stats: EnrichmentStats,
}

/// Display field name -> value.
pub type TableRecord = serde_json::Map<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_raw() {
        assert_eq!(OcrOutcome::from_raw("  \n "), OcrOutcome::Empty);
        assert_eq!(
            OcrOutcome::from_raw("  识别文本\n"),
            OcrOutcome::Text { text: "识别文本".to_string() }
        );
    }

    #[test]
    fn test_outcome_render() {
        assert_eq!(OcrOutcome::Empty.render(), OCR_EMPTY);
        assert_eq!(
            OcrOutcome::failed("bad image").render(),
            "OCR识别失败: bad image"
        );
        assert_eq!(OcrOutcome::Text { text: "abc".into() }.render(), "abc");
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(OcrOutcome::failed("boom")).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["cause"], "boom");
    }
}

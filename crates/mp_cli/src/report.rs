use std::fmt::Write;

use mp_core::ProcessedArticle;

const RULE: &str = "================================================================================";

/// First `limit` characters of `content`, with a marker when it was cut.
pub fn preview(content: &str, limit: usize) -> (String, bool) {
    if content.chars().count() <= limit {
        return (content.to_string(), false);
    }
    let cut: String = content.chars().take(limit).collect();
    (format!("{}...", cut), true)
}

/// Console summary of one processed article.
pub fn render(article: &ProcessedArticle, preview_chars: usize) -> String {
    let doc = &article.document;
    let mut out = String::new();

    let _ = writeln!(out, "\n{}\nWeChat article scrape result\n{}", RULE, RULE);
    let _ = writeln!(out, "\n📰 Title:\n   {}", doc.title);
    let _ = writeln!(out, "\n🔗 URL:\n   {}", doc.url);
    if !doc.account_name.is_empty() {
        let _ = writeln!(out, "\n👤 Account:\n   {}", doc.account_name);
    }
    if !doc.publish_date.is_empty() {
        let _ = writeln!(out, "\n📅 Published:\n   {}", doc.publish_date);
    }

    let (body, truncated) = preview(&doc.content, preview_chars);
    let _ = writeln!(out, "\n📝 Content:\n   {}", body);
    if truncated {
        let _ = writeln!(
            out,
            "   (content truncated to the first {} characters)",
            preview_chars
        );
    }

    let _ = writeln!(out, "\n🖼️  Images ({} total):", doc.images.len());
    for (i, image) in doc.images.iter().enumerate() {
        let _ = writeln!(out, "   Image {}:\n     URL: {}", i + 1, image.src);
        if !image.alt.is_empty() {
            let _ = writeln!(out, "     Alt: {}", image.alt);
        }
        if !image.title.is_empty() {
            let _ = writeln!(out, "     Title: {}", image.title);
        }
    }

    let _ = writeln!(out, "\n🔍 OCR results:");
    for result in &doc.ocr_results {
        let _ = writeln!(
            out,
            "   Image {} OCR:\n     Local path: {}\n     Text: {}\n",
            result.index,
            result.local_path,
            result.outcome.render()
        );
    }

    let stats = &article.stats;
    let _ = writeln!(
        out,
        "📊 {}/{} images enriched, {} failed{}",
        stats.images_enriched,
        stats.images_found,
        stats.images_failed,
        if stats.halted { " (halted)" } else { "" }
    );
    let _ = write!(out, "{}", RULE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mp_core::{ArticleDocument, EnrichmentStats, OcrOutcome, OcrResult};

    #[test]
    fn test_preview_counts_characters() {
        assert_eq!(preview("短文本", 5), ("短文本".to_string(), false));
        assert_eq!(preview("一二三四五六", 3), ("一二三...".to_string(), true));
    }

    #[test]
    fn test_render_lists_ocr_results() {
        let article = ProcessedArticle {
            document: ArticleDocument {
                url: "https://mp.weixin.qq.com/s/x".into(),
                title: "Hello".into(),
                content: "Body".into(),
                ocr_results: vec![OcrResult {
                    index: 2,
                    image_url: "https://a.cn/2.png".into(),
                    local_path: "downloaded_images/image_2.png".into(),
                    outcome: OcrOutcome::Empty,
                    alt: String::new(),
                    title: String::new(),
                }],
                ..Default::default()
            },
            stats: EnrichmentStats::default(),
        };
        let out = render(&article, 500);
        assert!(out.contains("Hello"));
        assert!(out.contains("Image 2 OCR"));
        assert!(out.contains("OCR识别结果为空"));
        assert!(!out.contains("truncated"));
    }
}

use mp_core::{ArticleDocument, FieldMapping, OcrResult, TableRecord};
use serde_json::Value;

/// Heading placed between the body and the OCR blocks ("OCR extracted content:").
pub const OCR_SECTION_LABEL: &str = "📸 图片 OCR 识别内容：";

/// One labelled block per OCR result: `[图片N] <url>` then the recognized text.
pub fn render_ocr_blocks(results: &[OcrResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[图片{}] {}\n{}", i + 1, r.image_url, r.outcome.render()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Body text followed by the OCR section, or the body alone without results.
pub fn assemble_content(body: &str, results: &[OcrResult]) -> String {
    if results.is_empty() {
        return body.to_string();
    }
    format!("{}\n\n{}\n{}", body, OCR_SECTION_LABEL, render_ocr_blocks(results))
}

/// Map a document onto the configured column names.
pub fn build_record(document: &ArticleDocument, fields: &FieldMapping) -> TableRecord {
    let content = assemble_content(&document.content, &document.ocr_results);
    let mut record = TableRecord::new();
    record.insert(fields.account_name.clone(), Value::String(document.account_name.clone()));
    record.insert(fields.title.clone(), Value::String(document.title.clone()));
    record.insert(fields.content.clone(), Value::String(content));
    // read counts are not exposed in the article page
    record.insert(fields.read_count.clone(), Value::String(String::new()));
    record.insert(fields.publish_date.clone(), Value::String(document.publish_date.clone()));
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use mp_core::OcrOutcome;

    fn result(index: usize, url: &str, outcome: OcrOutcome) -> OcrResult {
        OcrResult {
            index,
            image_url: url.to_string(),
            local_path: format!("downloaded_images/image_{}.jpg", index),
            outcome,
            alt: String::new(),
            title: String::new(),
        }
    }

    #[test]
    fn test_no_results_keeps_body() {
        assert_eq!(assemble_content("Body text", &[]), "Body text");
        assert_eq!(assemble_content("", &[]), "");
    }

    #[test]
    fn test_blocks_in_input_order() {
        let results = vec![
            result(3, "https://a.cn/3.png", OcrOutcome::Text { text: "第三".into() }),
            result(1, "https://a.cn/1.png", OcrOutcome::Empty),
            result(2, "https://a.cn/2.png", OcrOutcome::failed("bad")),
        ];
        let content = assemble_content("Body", &results);
        assert_eq!(
            content,
            "Body\n\n📸 图片 OCR 识别内容：\n\
             [图片1] https://a.cn/3.png\n第三\n\n\
             [图片2] https://a.cn/1.png\nOCR识别结果为空\n\n\
             [图片3] https://a.cn/2.png\nOCR识别失败: bad"
        );
    }

    #[test]
    fn test_build_record_uses_mapping() {
        let document = ArticleDocument {
            url: "https://mp.weixin.qq.com/s/x".into(),
            title: "Hello".into(),
            content: "Body".into(),
            account_name: "Account".into(),
            publish_date: "2024-01-01".into(),
            images: vec![],
            ocr_results: vec![result(1, "https://a.cn/1.png", OcrOutcome::Text { text: "t".into() })],
        };
        let fields = FieldMapping {
            title: "Headline".into(),
            ..FieldMapping::default()
        };

        let record = build_record(&document, &fields);
        assert_eq!(record.len(), 5);
        assert_eq!(record["Headline"], "Hello");
        assert_eq!(record["公众号名称"], "Account");
        assert_eq!(record["阅读量"], "");
        assert_eq!(record["发布日期"], "2024-01-01");
        let content = record["正文"].as_str().unwrap();
        assert!(content.starts_with("Body\n\n"));
        assert!(content.ends_with("[图片1] https://a.cn/1.png\nt"));
    }
}

//! Selector-chain extraction of article fields from raw markup.
//!
//! Each field is read through an ordered list of CSS selectors; the first
//! selector that yields non-empty text wins. Misses fall back to sentinels or
//! empty strings, so extraction only fails when there is no markup at all.

use std::sync::OnceLock;

use mp_core::config::{Config, SelectorConfig};
use mp_core::types::{CONTENT_NOT_FOUND, TITLE_NOT_FOUND};
use mp_core::{ArticleDocument, Error, ImageRef, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Ordered CSS selectors tried until one yields text.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    selectors: Vec<Selector>,
}

impl SelectorChain {
    pub fn parse<S: AsRef<str>>(rules: &[S]) -> Result<Self> {
        let selectors = rules
            .iter()
            .map(|rule| {
                Selector::parse(rule.as_ref()).map_err(|e| {
                    Error::Config(format!("Invalid selector {:?}: {:?}", rule.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { selectors })
    }

    /// Text of the first match of the first selector producing non-empty text.
    pub fn first_text(&self, document: &Html) -> Option<String> {
        self.first_with(document, stripped_text)
    }

    /// Like `first_text`, with a custom text reader for the matched element.
    pub fn first_with<F>(&self, document: &Html, read: F) -> Option<String>
    where
        F: Fn(ElementRef<'_>) -> String,
    {
        self.selectors.iter().find_map(|selector| {
            document
                .select(selector)
                .next()
                .map(&read)
                .filter(|text| !text.is_empty())
        })
    }
}

/// Concatenates the element's trimmed text nodes.
fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

/// Newline-joined text nodes, ignoring anything inside `<script>` or `<style>`.
fn block_text(element: ElementRef<'_>) -> String {
    let lines: Vec<&str> = element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map_or(false, |el| matches!(el.name(), "script" | "style"))
            });
            if hidden {
                None
            } else {
                Some(text.trim())
            }
        })
        .filter(|line| !line.is_empty())
        .collect();
    collapse_blank_lines(&lines.join("\n"))
}

/// Collapses any run of blank lines into a single empty line.
pub fn collapse_blank_lines(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\n\s*\n").unwrap());
    re.replace_all(text, "\n\n").into_owned()
}

/// Makes protocol-relative and root-relative image URLs absolute.
pub fn normalize_image_url(src: &str, site_origin: &str) -> String {
    if src.starts_with("//") {
        format!("https:{}", src)
    } else if src.starts_with('/') {
        format!("{}{}", site_origin.trim_end_matches('/'), src)
    } else {
        src.to_string()
    }
}

/// True when the URL contains any of the keywords, ignoring case.
pub fn is_filtered(url: &str, keywords: &[String]) -> bool {
    let url = url.to_lowercase();
    keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && url.contains(&keyword.to_lowercase()))
}

#[derive(Debug, Clone)]
pub struct Extractor {
    title: SelectorChain,
    content: SelectorChain,
    account: SelectorChain,
    date: SelectorChain,
    image: Selector,
    site_origin: String,
    filters: Vec<String>,
}

impl Extractor {
    pub fn new(selectors: &SelectorConfig, site_origin: &str, filters: Vec<String>) -> Result<Self> {
        Ok(Self {
            title: SelectorChain::parse(&selectors.title)?,
            content: SelectorChain::parse(&selectors.content)?,
            account: SelectorChain::parse(&selectors.account)?,
            date: SelectorChain::parse(&selectors.date)?,
            image: Selector::parse("img")
                .map_err(|e| Error::Config(format!("Invalid selector: {:?}", e)))?,
            site_origin: site_origin.to_string(),
            filters,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.selectors,
            &config.http.site_origin,
            config.images.filters.clone(),
        )
    }

    /// Build a document from the markup fetched for `url`.
    pub fn extract(&self, url: &str, html: &str) -> Result<ArticleDocument> {
        if html.trim().is_empty() {
            return Err(Error::Extraction(format!("Empty document returned for {}", url)));
        }
        let document = Html::parse_document(html);

        Ok(ArticleDocument {
            url: url.to_string(),
            title: self.extract_title(&document),
            content: self.extract_content(&document),
            account_name: self.extract_account_name(&document),
            publish_date: self.extract_publish_date(&document),
            images: self.extract_images(&document),
            ocr_results: Vec::new(),
        })
    }

    pub fn extract_title(&self, document: &Html) -> String {
        self.title
            .first_text(document)
            .unwrap_or_else(|| TITLE_NOT_FOUND.to_string())
    }

    pub fn extract_content(&self, document: &Html) -> String {
        self.content
            .first_with(document, block_text)
            .unwrap_or_else(|| CONTENT_NOT_FOUND.to_string())
    }

    pub fn extract_account_name(&self, document: &Html) -> String {
        self.account.first_text(document).unwrap_or_default()
    }

    pub fn extract_publish_date(&self, document: &Html) -> String {
        self.date.first_text(document).unwrap_or_default()
    }

    /// Every `<img>` in the page, normalized and with decorative images dropped.
    pub fn extract_images(&self, document: &Html) -> Vec<ImageRef> {
        document
            .select(&self.image)
            .filter_map(|img| {
                let attrs = img.value();
                let src = attrs
                    .attr("src")
                    .filter(|s| !s.trim().is_empty())
                    .or_else(|| attrs.attr("data-src").filter(|s| !s.trim().is_empty()))?;
                let src = normalize_image_url(src.trim(), &self.site_origin);
                if is_filtered(&src, &self.filters) {
                    return None;
                }
                Some(ImageRef {
                    src,
                    alt: attrs.attr("alt").unwrap_or_default().to_string(),
                    title: attrs.attr("title").unwrap_or_default().to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor {
        Extractor::from_config(&Config::default()).unwrap()
    }

    #[test]
    fn test_title_chain_order() {
        let html = r#"<html><head><title>Page</title></head><body>
            <h1>Generic</h1><h1 class="rich_media_title"> Specific </h1></body></html>"#;
        let doc = extractor().extract("https://mp.weixin.qq.com/s/x", html).unwrap();
        assert_eq!(doc.title, "Specific");
    }

    #[test]
    fn test_empty_match_falls_through() {
        let html = r#"<h1 class="rich_media_title">   </h1><title>From title tag</title>"#;
        let doc = extractor().extract("u", html).unwrap();
        assert_eq!(doc.title, "From title tag");
    }

    #[test]
    fn test_missing_fields_use_sentinels() {
        let doc = extractor().extract("u", "<p>nothing useful</p>").unwrap();
        assert_eq!(doc.title, TITLE_NOT_FOUND);
        assert_eq!(doc.content, CONTENT_NOT_FOUND);
        assert_eq!(doc.account_name, "");
        assert_eq!(doc.publish_date, "");
        assert!(doc.images.is_empty());
    }

    #[test]
    fn test_empty_markup_is_extraction_error() {
        let err = extractor().extract("u", "  \n ").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_content_skips_script_and_style() {
        let html = r#"<div class="rich_media_content">
            <p>First line</p>
            <script>var tracking = 1;</script>
            <style>.x { color: red }</style>
            <p>Second line</p>
        </div>"#;
        let doc = extractor().extract("u", html).unwrap();
        assert_eq!(doc.content, "First line\nSecond line");
    }

    #[test]
    fn test_content_falls_back_to_js_content() {
        let html = r#"<div id="js_content"><section>Body <b>text</b></section></div>"#;
        let doc = extractor().extract("u", html).unwrap();
        assert_eq!(doc.content, "Body\ntext");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n \n\t\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\nb"), "a\nb");
    }

    #[test]
    fn test_normalize_image_url() {
        let origin = "https://mp.weixin.qq.com";
        assert_eq!(
            normalize_image_url("//mmbiz.qpic.cn/a.png", origin),
            "https://mmbiz.qpic.cn/a.png"
        );
        assert_eq!(
            normalize_image_url("/mp/img/a.png", origin),
            "https://mp.weixin.qq.com/mp/img/a.png"
        );
        assert_eq!(normalize_image_url("http://x.com/a.png", origin), "http://x.com/a.png");
        assert_eq!(normalize_image_url("data:image/png;base64,xx", origin), "data:image/png;base64,xx");

        for src in ["//a.cn/b.jpg", "/c/d.jpg", "https://e.cn/f.jpg"] {
            let once = normalize_image_url(src, origin);
            assert!(once.starts_with("https://"));
            assert_eq!(normalize_image_url(&once, origin), once);
        }
    }

    #[test]
    fn test_images_prefer_src_then_data_src() {
        let html = r#"<body>
            <img src="//mmbiz.qpic.cn/one.jpg" alt="one" title="t1">
            <img src="" data-src="https://mmbiz.qpic.cn/two.png">
            <img data-src="/three.gif">
            <img alt="no source">
        </body>"#;
        let doc = extractor().extract("u", html).unwrap();
        let srcs: Vec<_> = doc.images.iter().map(|i| i.src.as_str()).collect();
        assert_eq!(
            srcs,
            vec![
                "https://mmbiz.qpic.cn/one.jpg",
                "https://mmbiz.qpic.cn/two.png",
                "https://mp.weixin.qq.com/three.gif",
            ]
        );
        assert_eq!(doc.images[0].alt, "one");
        assert_eq!(doc.images[0].title, "t1");
        assert_eq!(doc.images[1].alt, "");
    }

    #[test]
    fn test_images_filtered_case_insensitive() {
        let html = r#"<body>
            <img src="https://cdn.cn/user_AVATAR.png">
            <img src="https://cdn.cn/Logo/brand.png">
            <img src="https://cdn.cn/QRCode.jpg">
            <img src="https://cdn.cn/favicon.ico">
            <img src="https://cdn.cn/photo.jpg">
        </body>"#;
        let doc = extractor().extract("u", html).unwrap();
        assert_eq!(doc.images.len(), 1);
        assert_eq!(doc.images[0].src, "https://cdn.cn/photo.jpg");
    }

    #[test]
    fn test_account_and_date() {
        let html = r#"<div class="rich_media_meta_list">
            <a id="js_name"> 某公众号 </a>
            <em id="publish_time">2024-05-01 08:00</em>
        </div>"#;
        let doc = extractor().extract("u", html).unwrap();
        assert_eq!(doc.account_name, "某公众号");
        assert_eq!(doc.publish_date, "2024-05-01 08:00");
    }

    #[test]
    fn test_invalid_selector_is_config_error() {
        let mut selectors = SelectorConfig::default();
        selectors.title = vec!["h1[".to_string()];
        let err = Extractor::new(&selectors, "https://x", vec![]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

//! Runtime configuration.
//!
//! Every field has a default so a bare `Config::default()` scrapes WeChat
//! articles with Tesseract and keeps Feishu writes disabled. A JSON file may
//! override any subset of fields, and environment variables win over both.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ocr::OcrOptions;
use crate::{Error, Result};

pub const DEFAULT_SITE_ORIGIN: &str = "https://mp.weixin.qq.com";
pub const DEFAULT_FEISHU_BASE_URL: &str = "https://open.feishu.cn/open-apis";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub selectors: SelectorConfig,
    pub images: ImageConfig,
    pub ocr: OcrConfig,
    pub feishu: FeishuConfig,
    pub server: ServerConfig,
    /// Characters of body text shown in console reports
    pub content_preview: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            selectors: SelectorConfig::default(),
            images: ImageConfig::default(),
            ocr: OcrConfig::default(),
            feishu: FeishuConfig::default(),
            server: ServerConfig::default(),
            content_preview: 500,
        }
    }
}

impl Config {
    /// Load defaults, then the optional JSON file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!("⚙️ Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Apply `MP_*` and `FEISHU_*` overrides resolved through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MP_OUTPUT_DIR") {
            self.images.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MP_REQUEST_TIMEOUT") {
            self.http.timeout_secs = parse_var("MP_REQUEST_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("MP_REQUEST_DELAY") {
            self.http.delay_secs = parse_var("MP_REQUEST_DELAY", &v)?;
        }
        if let Some(v) = lookup("MP_MAX_RETRIES") {
            self.http.max_retries = parse_var("MP_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("MP_CONCURRENCY") {
            self.images.concurrency = parse_var("MP_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("MP_CONTINUE_ON_ERROR") {
            self.images.continue_on_error = parse_bool("MP_CONTINUE_ON_ERROR", &v)?;
        }
        if let Some(v) = lookup("MP_OCR_ENGINE") {
            self.ocr.engine = v;
        }
        if let Some(v) = lookup("MP_OCR_LANGUAGE") {
            self.ocr.language = v;
        }
        if let Some(v) = lookup("MP_OCR_PSM") {
            self.ocr.psm = parse_var("MP_OCR_PSM", &v)?;
        }
        if let Some(v) = lookup("MP_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("FEISHU_ENABLED") {
            self.feishu.enabled = parse_bool("FEISHU_ENABLED", &v)?;
        }
        if let Some(v) = lookup("FEISHU_APP_ID") {
            self.feishu.app_id = v;
        }
        if let Some(v) = lookup("FEISHU_APP_SECRET") {
            self.feishu.app_secret = v;
        }
        if let Some(v) = lookup("FEISHU_APP_TOKEN") {
            self.feishu.app_token = v;
        }
        if let Some(v) = lookup("FEISHU_TABLE_ID") {
            self.feishu.table_id = v;
        }
        if let Some(v) = lookup("FEISHU_AUTH_MODE") {
            self.feishu.auth_mode = v.parse()?;
        }
        if let Some(v) = lookup("FEISHU_BEARER_TOKEN") {
            self.feishu.bearer_token = Some(v).filter(|t| !t.is_empty());
        }
        if let Some(v) = lookup("FEISHU_BASE_URL") {
            self.feishu.base_url = v;
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{}={:?}: {}", key, value, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{}={:?}: expected a boolean", key, value))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Pause between sequential image requests
    pub delay_secs: f64,
    /// Extra attempts for markup and image downloads
    pub max_retries: u32,
    pub headers: BTreeMap<String, String>,
    /// Origin prepended to root-relative image URLs
    pub site_origin: String,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_secs.max(0.0))
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        let headers = [
            ("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"),
            ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
            ("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8"),
            ("Connection", "keep-alive"),
            ("Upgrade-Insecure-Requests", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            timeout_secs: 30,
            delay_secs: 1.0,
            max_retries: 3,
            headers,
            site_origin: DEFAULT_SITE_ORIGIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub title: Vec<String>,
    pub content: Vec<String>,
    pub account: Vec<String>,
    pub date: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            title: owned(&[
                "h1.rich_media_title",
                r#"h1[id*="activity-name"]"#,
                "h1",
                "title",
            ]),
            content: owned(&[
                "div.rich_media_content",
                r#"div[id*="js_content"]"#,
                "div.article-content",
                "div.content",
            ]),
            account: owned(&[
                "#js_name",
                "a#js_name",
                ".rich_media_meta_list .rich_media_meta_nickname",
                "span.rich_media_meta_text",
            ]),
            date: owned(&["#publish_time", "span.rich_media_meta_text"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Case-insensitive URL substrings that mark decorative images
    pub filters: Vec<String>,
    pub filename_prefix: String,
    pub filename_suffix: String,
    pub output_dir: PathBuf,
    /// 1 keeps the polite sequential mode with `http.delay_secs` between images
    pub concurrency: usize,
    pub continue_on_error: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            filters: owned(&["avatar", "icon", "logo", "qrcode"]),
            filename_prefix: "image_".to_string(),
            filename_suffix: String::new(),
            output_dir: PathBuf::from("downloaded_images"),
            concurrency: 1,
            continue_on_error: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// `tesseract` or `dummy`
    pub engine: String,
    pub binary: String,
    pub language: String,
    pub psm: u8,
}

impl OcrConfig {
    pub fn options(&self) -> OcrOptions {
        OcrOptions {
            language: self.language.clone(),
            psm: self.psm,
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        let options = OcrOptions::default();
        Self {
            engine: "tesseract".to_string(),
            binary: "tesseract".to_string(),
            language: options.language,
            psm: options.psm,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Exchange app id/secret for a tenant access token
    #[default]
    Tenant,
    /// Use the configured bearer token as-is
    User,
}

impl FromStr for AuthMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tenant" => Ok(AuthMode::Tenant),
            "user" => Ok(AuthMode::User),
            other => Err(Error::Config(format!("unknown auth mode: {}", other))),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeishuConfig {
    pub enabled: bool,
    pub app_id: String,
    pub app_secret: String,
    /// Bitable base ("app token")
    pub app_token: String,
    pub table_id: String,
    pub auth_mode: AuthMode,
    pub bearer_token: Option<String>,
    pub base_url: String,
    pub fields: FieldMapping,
}

impl Default for FeishuConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            app_id: String::new(),
            app_secret: String::new(),
            app_token: String::new(),
            table_id: String::new(),
            auth_mode: AuthMode::default(),
            bearer_token: None,
            base_url: DEFAULT_FEISHU_BASE_URL.to_string(),
            fields: FieldMapping::default(),
        }
    }
}

impl fmt::Debug for FeishuConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeishuConfig")
            .field("enabled", &self.enabled)
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("app_token", &self.app_token)
            .field("table_id", &self.table_id)
            .field("auth_mode", &self.auth_mode)
            .field("bearer_token", &self.bearer_token.as_deref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Column names used for each logical field of the written record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub account_name: String,
    pub title: String,
    pub content: String,
    pub read_count: String,
    pub publish_date: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            account_name: "公众号名称".to_string(),
            title: "标题".to_string(),
            content: "正文".to_string(),
            read_count: "阅读量".to_string(),
            publish_date: "发布日期".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
        assert_eq!(config.http.delay(), Duration::from_secs(1));
        assert_eq!(config.selectors.title[0], "h1.rich_media_title");
        assert_eq!(config.images.filters, vec!["avatar", "icon", "logo", "qrcode"]);
        assert_eq!(config.ocr.options(), OcrOptions::default());
        assert_eq!(config.feishu.auth_mode, AuthMode::Tenant);
        assert!(!config.feishu.enabled);
        assert!(config.images.continue_on_error);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"feishu": {{"enabled": true, "fields": {{"title": "Headline"}}}}, "ocr": {{"language": "eng"}}}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.feishu.enabled);
        assert_eq!(config.feishu.fields.title, "Headline");
        assert_eq!(config.feishu.fields.content, "正文");
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.psm, 6);
        assert_eq!(config.content_preview, 500);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MP_REQUEST_DELAY", "0.5"),
            ("MP_CONTINUE_ON_ERROR", "false"),
            ("FEISHU_AUTH_MODE", "user"),
            ("FEISHU_BEARER_TOKEN", "u-token"),
            ("FEISHU_TABLE_ID", "tbl123"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.http.delay(), Duration::from_millis(500));
        assert!(!config.images.continue_on_error);
        assert_eq!(config.feishu.auth_mode, AuthMode::User);
        assert_eq!(config.feishu.bearer_token.as_deref(), Some("u-token"));
        assert_eq!(config.feishu.table_id, "tbl123");
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|k| (k == "MP_OCR_PSM").then(|| "six".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut feishu = FeishuConfig::default();
        feishu.app_secret = "s3cret".to_string();
        feishu.bearer_token = Some("u-token".to_string());
        let out = format!("{:?}", feishu);
        assert!(!out.contains("s3cret"));
        assert!(!out.contains("u-token"));
    }
}

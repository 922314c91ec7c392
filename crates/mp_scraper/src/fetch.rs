use std::time::Duration;

use async_trait::async_trait;
use mp_core::config::HttpConfig;
use mp_core::{ByteFetcher, Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::{debug, warn};

/// `ByteFetcher` over reqwest with browser-like headers, a timeout and a
/// small retry budget for transient failures.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("Invalid header value for {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_delay: config.delay(),
        })
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<Vec<u8>, Attempt> {
        let response = self.client.get(url).send().await.map_err(|e| Attempt {
            error: Error::Fetch(format!("{}: {}", url, e)),
            retry: e.is_timeout() || e.is_connect() || e.is_request(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Attempt {
                error: Error::Fetch(format!("{} returned status {}", url, status)),
                retry: status.is_server_error() || status.as_u16() == 429,
            });
        }

        let bytes = response.bytes().await.map_err(|e| Attempt {
            error: Error::Fetch(format!("{}: failed to read body: {}", url, e)),
            retry: true,
        })?;
        Ok(bytes.to_vec())
    }
}

struct Attempt {
    error: Error,
    retry: bool,
}

#[async_trait]
impl ByteFetcher for HttpFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(bytes) => {
                    debug!("Fetched {} ({} bytes)", url, bytes.len());
                    return Ok(bytes);
                }
                Err(failed) if failed.retry && attempt < self.max_retries => {
                    attempt += 1;
                    warn!("{}; retrying {}/{}", failed.error, attempt, self.max_retries);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(failed) => return Err(failed.error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_default_headers_are_valid() {
        assert!(HttpFetcher::new(&HttpConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_header_is_config_error() {
        let mut config = HttpConfig::default();
        config.headers = BTreeMap::from([("Bad Header".to_string(), "x".to_string())]);
        assert!(matches!(HttpFetcher::new(&config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let mut config = HttpConfig::default();
        config.max_retries = 0;
        config.timeout_secs = 2;
        let fetcher = HttpFetcher::new(&config).unwrap();
        let err = fetcher.fetch_bytes("http://127.0.0.1:9/article").await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
        assert!(err.is_client_facing());
    }
}

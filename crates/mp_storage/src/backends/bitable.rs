//! Feishu Bitable REST client.
//!
//! Three endpoints are used: tenant token exchange, table listing and record
//! creation. Every response is a JSON envelope whose `code` must be 0; an
//! HTTP 200 with a non-zero code is still a failure.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use mp_core::config::FeishuConfig;
use mp_core::{AuthMode, Error, RecordStorage, Result, TableRecord};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Feishu codes for a missing, invalid or expired access token.
const TOKEN_REJECTED_CODES: &[i64] = &[99991661, 99991663, 99991664, 99991668, 99991671, 99991677];

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TenantTokenResponse {
    #[serde(default)]
    code: i64,
    tenant_access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TablePage {
    #[serde(default)]
    items: Vec<TableInfo>,
    #[serde(default)]
    has_more: bool,
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableInfo {
    pub table_id: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
}

impl TableInfo {
    pub fn identifier(&self) -> &str {
        self.table_id.as_deref().or(self.id.as_deref()).unwrap_or_default()
    }

    fn describe(&self) -> String {
        format!("{}({})", self.name.as_deref().unwrap_or_default(), self.identifier())
    }
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    record: Option<RecordInfo>,
}

#[derive(Debug, Deserialize)]
struct RecordInfo {
    record_id: Option<String>,
}

pub struct BitableClient {
    http: Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    app_token: String,
    table_id: String,
    auth_mode: AuthMode,
    bearer_token: Option<String>,
    /// Filled once per client; tokens are never refreshed.
    tenant_token: OnceCell<String>,
}

impl fmt::Debug for BitableClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitableClient")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("app_token", &self.app_token)
            .field("table_id", &self.table_id)
            .field("auth_mode", &self.auth_mode)
            .field("bearer_token", &self.bearer_token.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

impl BitableClient {
    pub fn from_config(config: &FeishuConfig, timeout: Duration) -> Result<Self> {
        if config.app_token.is_empty() || config.table_id.is_empty() {
            return Err(Error::Config(
                "Feishu app_token and table_id are required when Feishu is enabled".to_string(),
            ));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            app_token: config.app_token.clone(),
            table_id: config.table_id.clone(),
            auth_mode: config.auth_mode,
            bearer_token: config.bearer_token.clone().filter(|t| !t.is_empty()),
            tenant_token: OnceCell::new(),
        })
    }

    /// Bearer token for the next request. A configured user token wins in
    /// `user` mode; otherwise the app credentials are exchanged once.
    async fn access_token(&self) -> Result<String> {
        if self.auth_mode == AuthMode::User {
            if let Some(token) = &self.bearer_token {
                return Ok(token.clone());
            }
            debug!("User auth mode without a bearer token, falling back to tenant token");
        }
        let token = self
            .tenant_token
            .get_or_try_init(|| self.request_tenant_token())
            .await?;
        Ok(token.clone())
    }

    async fn request_tenant_token(&self) -> Result<String> {
        if self.app_id.is_empty() || self.app_secret.is_empty() {
            return Err(Error::Auth(
                "app_id and app_secret are required for tenant authentication".to_string(),
            ));
        }
        let url = format!("{}/auth/v3/tenant_access_token/internal/", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "app_id": self.app_id, "app_secret": self.app_secret }))
            .send()
            .await
            .map_err(|e| Error::Auth(format!("tenant_access_token request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<TenantTokenResponse> = serde_json::from_str(&body).ok();
        match parsed {
            Some(TenantTokenResponse {
                code: 0,
                tenant_access_token: Some(token),
            }) if status == StatusCode::OK => {
                info!("🔑 Obtained Feishu tenant access token");
                Ok(token)
            }
            _ => Err(Error::Auth(format!(
                "tenant_access_token request failed: status={}, body={}",
                status.as_u16(),
                body
            ))),
        }
    }

    /// Parse an envelope, requiring HTTP 200 and `code == 0`.
    fn check_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> Option<Envelope<T>> {
        if status != StatusCode::OK {
            return None;
        }
        serde_json::from_str::<Envelope<T>>(body)
            .ok()
            .filter(|envelope| envelope.code == 0)
    }

    /// True when the response says the bearer token itself was refused.
    fn token_rejected(status: StatusCode, body: &str) -> bool {
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return true;
        }
        serde_json::from_str::<Envelope<serde_json::Value>>(body)
            .map_or(false, |envelope| TOKEN_REJECTED_CODES.contains(&envelope.code))
    }

    fn rejection(status: StatusCode, body: &str) -> Error {
        Error::Auth(format!(
            "access token rejected: status={}, body={}",
            status.as_u16(),
            body
        ))
    }

    /// Every table in the configured base.
    pub async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let token = self.access_token().await?;
        let url = format!("{}/bitable/v1/apps/{}/tables", self.base_url, self.app_token);
        let mut tables = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(&[("page_size", "100")]);
            if let Some(page) = &page_token {
                request = request.query(&[("page_token", page.as_str())]);
            }
            let response = request.send().await.map_err(|e| Error::Api {
                status: 0,
                body: format!("list tables request failed: {}", e),
            })?;
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            let page = match Self::check_envelope::<TablePage>(status, &body) {
                Some(envelope) => envelope.data,
                None if Self::token_rejected(status, &body) => {
                    return Err(Self::rejection(status, &body))
                }
                None => {
                    return Err(Error::Api {
                        status: status.as_u16(),
                        body,
                    })
                }
            };
            let Some(page) = page else { break };
            tables.extend(page.items);
            match page.page_token {
                Some(next) if page.has_more && !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        debug!("Found {} tables in base {}", tables.len(), self.app_token);
        Ok(tables)
    }

    /// Fail with the list of available tables when the configured one is absent.
    pub async fn ensure_table_exists(&self) -> Result<()> {
        let tables = self.list_tables().await?;
        if tables.iter().any(|t| t.identifier() == self.table_id) {
            return Ok(());
        }
        Err(Error::Schema {
            table_id: self.table_id.clone(),
            available: tables.iter().map(TableInfo::describe).collect(),
        })
    }

    /// Create one record and return its `record_id`.
    pub async fn add_record(&self, fields: &TableRecord) -> Result<String> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/bitable/v1/apps/{}/tables/{}/records",
            self.base_url, self.app_token, self.table_id
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(|e| Error::Write {
                status: 0,
                body: format!("create record request failed: {}", e),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let envelope = match Self::check_envelope::<CreatedRecord>(status, &body) {
            Some(envelope) => envelope,
            None if Self::token_rejected(status, &body) => return Err(Self::rejection(status, &body)),
            None => {
                return Err(Error::Write {
                    status: status.as_u16(),
                    body,
                })
            }
        };
        debug!("Feishu replied: {}", envelope.msg);

        Ok(envelope
            .data
            .and_then(|d| d.record)
            .and_then(|r| r.record_id)
            .unwrap_or_default())
    }
}

#[async_trait]
impl RecordStorage for BitableClient {
    fn name(&self) -> &str {
        "Feishu Bitable"
    }

    async fn ensure_ready(&self) -> Result<()> {
        self.ensure_table_exists().await
    }

    async fn store_record(&self, record: &TableRecord) -> Result<String> {
        self.add_record(record).await
    }
}

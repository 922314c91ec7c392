use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Enrichment error: {0}")]
    Enrichment(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Table {table_id} not found in base. {}", describe_tables(.available))]
    Schema {
        table_id: String,
        available: Vec<String>,
    },

    #[error("Table-store request failed: status={status}, body={body}")]
    Api { status: u16, body: String },

    #[error("Record write failed: status={status}, body={body}")]
    Write { status: u16, body: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn describe_tables(available: &[String]) -> String {
    if available.is_empty() {
        "No tables were visible; check the app token and the application's access to the base.".to_string()
    } else {
        format!("Available tables: {}", available.join(", "))
    }
}

impl Error {
    /// Errors caused by the requested document rather than by this service.
    pub fn is_client_facing(&self) -> bool {
        matches!(
            self,
            Error::Fetch(_) | Error::Extraction(_) | Error::InvalidUrl(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Fetch(_) | Error::Http(_))
    }
}

/// Per-image failure. Never aborts a batch by itself; the enrichment loop
/// records it and moves on unless configured to stop.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("download failed for {url}: {cause}")]
    Download { url: String, cause: String },

    #[error("could not store {path}: {cause}")]
    Store { path: String, cause: String },
}

impl From<EnrichmentError> for Error {
    fn from(err: EnrichmentError) -> Self {
        Error::Enrichment(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_tables() {
        let err = Error::Schema {
            table_id: "tblX".to_string(),
            available: vec!["Articles(tblA)".to_string(), "Drafts(tblB)".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("tblX"));
        assert!(message.contains("Articles(tblA)"));
        assert!(message.contains("Drafts(tblB)"));
    }

    #[test]
    fn test_schema_error_without_tables() {
        let err = Error::Schema {
            table_id: "tblX".to_string(),
            available: vec![],
        };
        assert!(err.to_string().contains("No tables were visible"));
    }

    #[test]
    fn test_classification() {
        assert!(Error::Fetch("timeout".into()).is_client_facing());
        assert!(Error::Fetch("timeout".into()).is_retryable());
        assert!(Error::Extraction("empty".into()).is_client_facing());
        assert!(!Error::Auth("denied".into()).is_client_facing());
        assert!(!Error::Write { status: 200, body: "{}".into() }.is_retryable());
    }
}

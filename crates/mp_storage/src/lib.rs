use std::sync::Arc;
use mp_core::{Config, RecordStorage, Result};

pub mod backends;

pub use backends::*;

/// Table store selected by configuration: the Feishu client when enabled,
/// otherwise none (article processing still works, persisting does not).
pub fn create_storage(config: &Config) -> Result<Option<Arc<dyn RecordStorage>>> {
    if !config.feishu.enabled {
        tracing::info!("Feishu persistence disabled");
        return Ok(None);
    }
    let client = BitableClient::from_config(&config.feishu, config.http.timeout())?;
    Ok(Some(Arc::new(client)))
}

pub mod prelude {
    pub use super::backends::*;
    pub use mp_core::{RecordStorage, TableRecord};
}

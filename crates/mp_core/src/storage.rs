use async_trait::async_trait;
use crate::types::TableRecord;
use crate::Result;

#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Verify credentials and that the target table is reachable
    async fn ensure_ready(&self) -> Result<()>;

    /// Write one record, returning the identifier assigned by the backend
    async fn store_record(&self, record: &TableRecord) -> Result<String>;
}

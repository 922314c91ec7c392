use async_trait::async_trait;
use mp_core::{RecordStorage, Result, TableRecord};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps written records in memory; used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    records: Arc<RwLock<Vec<(String, TableRecord)>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<(String, TableRecord)> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl RecordStorage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn store_record(&self, record: &TableRecord) -> Result<String> {
        let mut records = self.records.write().await;
        let id = format!("rec{:06}", records.len() + 1);
        records.push((id.clone(), record.clone()));
        Ok(id)
    }
}

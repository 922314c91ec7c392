use std::sync::Arc;

use chrono::{DateTime, Utc};
use mp_scraper::ArticlePipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ArticlePipeline>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: Arc<ArticlePipeline>) -> Self {
        Self {
            pipeline,
            started_at: Utc::now(),
        }
    }

    pub fn feishu_enabled(&self) -> bool {
        self.pipeline.storage_enabled()
    }
}

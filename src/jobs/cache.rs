use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Most recent primary response per job id
#[derive(Debug, Clone, Default)]
pub struct OutputCache {
    outputs: Arc<RwLock<HashMap<String, String>>>,
}

impl OutputCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, job_id: &str) -> Option<String> {
        self.outputs.read().await.get(job_id).cloned()
    }

    pub async fn set(&self, job_id: &str, output: String) {
        self.outputs.write().await.insert(job_id.to_string(), output);
    }

    pub async fn remove(&self, job_id: &str) -> Option<String> {
        self.outputs.write().await.remove(job_id)
    }
}

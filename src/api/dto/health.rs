//! Health check DTOs for API responses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,
    pub version: String,
    /// RFC 3339
    pub timestamp: String,
    /// Jobs currently stored
    pub jobs: usize,
}

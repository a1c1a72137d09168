//! Job-related response DTOs.
//!
//! Request bodies are the [`crate::models`] records themselves.

use serde::{Deserialize, Serialize};

/// Last cached primary response of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutputResponse {
    pub job_id: String,
    pub output: String,
}

//! Data Transfer Objects for API responses.

mod error;
mod health;
mod job;

pub use error::ErrorResponse;
pub use health::HealthResponse;
pub use job::JobOutputResponse;

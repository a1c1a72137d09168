//! Job storage.
//!
//! The scheduler only sees the [`JobRepository`] trait; the service wires in
//! the YAML file implementation.

mod job_repo;

pub use job_repo::{FileJobRepository, JobRepository};

//! Command handlers

mod serve;

pub use serve::{DryRunReport, ServeCommandHandler};

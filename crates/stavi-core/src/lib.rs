//! Shared plumbing for the stavi crates: tracing setup and operation timing.

pub mod timing;
pub mod tracing;

pub use timing::OperationTimer;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

//! The `stavi` operator CLI.
//!
//! Fetches access tokens, seals private-key files with the configured
//! secrets, and inspects configuration.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use config::CliConfig;
pub use error::{CliError, CliResult};

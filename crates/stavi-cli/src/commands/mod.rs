//! Subcommand implementations.

pub mod check_key;
pub mod config;
pub mod seal;
pub mod token;

//! CLI error types.

use std::io;
use std::path::PathBuf;

use stavi_auth::AuthError;
use stavi_core::TracingError;
use stavi_secrets::SecretError;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by the `stavi` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Tracing(#[from] TracingError),

    /// Reading or writing a file failed.
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No token could be obtained; details are in the log.
    #[error("no access token available for {0}")]
    NoToken(String),
}

impl CliError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

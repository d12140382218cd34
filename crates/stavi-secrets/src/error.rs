//! Error types for secret lookup and decryption.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for secrets operations.
pub type SecretResult<T> = Result<T, SecretError>;

/// Errors raised while loading secrets or running a decryption pipeline.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The named secret is absent from the store or blank.
    #[error("secret '{name}' was not found")]
    Missing { name: String },

    /// The named secret is present but cannot be interpreted.
    #[error("secret '{name}' is malformed: {message}")]
    Malformed { name: String, message: String },

    /// The salting composition or length is not usable.
    #[error("invalid salting strategy: {0}")]
    InvalidSaltingStrategy(String),

    /// A single-use pipeline was asked for its result a second time.
    #[error("secret pipeline already consumed; key material has been discarded")]
    PipelineReuse,

    /// Reading a file failed.
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The payload is not valid base64.
    #[error("base64 decoding failed: {0}")]
    Decode(#[from] base64::DecodeError),

    /// AES key/IV setup or decryption failed.
    #[error("cipher error: {0}")]
    Cipher(String),

    /// The decrypted payload does not carry the expected salt.
    #[error("salt removal failed: {0}")]
    Salt(String),

    /// The plaintext is not valid UTF-8. Only the error position is kept.
    #[error("secret is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
}

impl SecretError {
    /// Creates a missing-secret error.
    pub fn missing(name: impl Into<String>) -> Self {
        Self::Missing { name: name.into() }
    }

    /// Creates a malformed-secret error.
    pub fn malformed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an IO error bound to a path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

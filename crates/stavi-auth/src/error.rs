//! Error types for assertion signing and access token retrieval.
//!
//! These errors never leave the crate through the token-retrieval entry
//! points; [`crate::AccessTokenCache::retrieve`] logs them and returns `None`.

use stavi_secrets::SecretError;
use thiserror::Error;

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur while producing or exchanging an assertion.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Secret lookup or decryption failed.
    #[error("secret error: {0}")]
    Secret(#[from] SecretError),

    /// The key bytes do not form a private key for the algorithm.
    #[error("invalid private key for {algorithm}: {message}")]
    InvalidKey {
        algorithm: String,
        message: String,
    },

    /// No signing strategy exists for the requested algorithm.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature could not be produced.
    #[error("signing failed: {0}")]
    SigningFailure(String),

    /// The token endpoint answered with an `error` field.
    #[error("token exchange rejected ({error}): {description}")]
    TokenExchange { error: String, description: String },

    /// The HTTP exchange itself failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint response could not be understood.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    /// Settings are missing or inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Creates an invalid key error.
    pub fn invalid_key(algorithm: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidKey {
            algorithm: algorithm.into(),
            message: message.into(),
        }
    }

    /// Creates a token exchange error from the endpoint's error fields.
    pub fn token_exchange(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::TokenExchange {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns true if the next scheduled attempt may succeed without
    /// operator action.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_exchange_display() {
        let err = AuthError::token_exchange("invalid_grant", "Invalid JWT Signature.");
        assert_eq!(
            err.to_string(),
            "token exchange rejected (invalid_grant): Invalid JWT Signature."
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn http_errors_are_transient() {
        assert!(AuthError::Http("connection reset".into()).is_transient());
        assert!(!AuthError::configuration("no issuer").is_transient());
    }

    #[test]
    fn secret_errors_convert() {
        let err: AuthError = SecretError::PipelineReuse.into();
        assert!(matches!(err, AuthError::Secret(SecretError::PipelineReuse)));
        assert!(err.to_string().starts_with("secret error:"));
    }

    #[test]
    fn invalid_key_names_algorithm() {
        let err = AuthError::invalid_key("RS256", "not PKCS#8");
        assert!(err.to_string().contains("RS256"));
    }
}

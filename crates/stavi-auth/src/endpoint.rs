//! Token endpoint transports.
//!
//! [`HttpTokenEndpoint`] posts the assertion over HTTPS. [`FileTokenEndpoint`]
//! answers every request with a canned response read from disk, for running
//! without network access.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{AuthError, AuthResult};

/// OAuth 2.0 grant type for JWT bearer assertions.
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Request body posted to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub assertion: String,
}

impl TokenRequest {
    pub fn jwt_bearer(assertion: impl Into<String>) -> Self {
        Self {
            grant_type: JWT_BEARER_GRANT_TYPE.to_string(),
            assertion: assertion.into(),
        }
    }
}

/// Token endpoint response; success and error fields are all optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// Parses a response body.
    pub fn from_json(body: &str) -> AuthResult<Self> {
        serde_json::from_str(body)
            .map_err(|e| AuthError::InvalidResponse(format!("invalid token response: {}", e)))
    }
}

/// Exchanges a token request for a response.
pub trait TokenEndpoint: Send + Sync + fmt::Debug {
    fn exchange(&self, url: &Url, request: &TokenRequest) -> AuthResult<TokenResponse>;
}

/// Blocking HTTP transport.
#[derive(Debug)]
pub struct HttpTokenEndpoint {
    client: reqwest::blocking::Client,
}

impl HttpTokenEndpoint {
    /// Creates a transport whose connect and total request time are bounded
    /// by `timeout`.
    pub fn new(timeout: Duration) -> AuthResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl TokenEndpoint for HttpTokenEndpoint {
    fn exchange(&self, url: &Url, request: &TokenRequest) -> AuthResult<TokenResponse> {
        debug!(url = %url, "posting assertion to token endpoint");
        let response = self
            .client
            .post(url.clone())
            .json(request)
            .send()
            .map_err(|e| AuthError::Http(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| AuthError::Http(format!("failed to read response: {}", e)))?;

        // Error responses carry `error`/`error_description` in the body.
        match TokenResponse::from_json(&body) {
            Ok(parsed) if status.is_success() || parsed.error.is_some() => Ok(parsed),
            Ok(_) => Err(AuthError::Http(format!("token endpoint returned {}", status))),
            Err(e) if status.is_success() => Err(e),
            Err(_) => {
                warn!(status = %status, "token endpoint returned a non-JSON error");
                Err(AuthError::Http(format!("token endpoint returned {}", status)))
            }
        }
    }
}

/// Replays a token response stored in a file.
#[derive(Debug, Clone)]
pub struct FileTokenEndpoint {
    path: PathBuf,
}

impl FileTokenEndpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenEndpoint for FileTokenEndpoint {
    fn exchange(&self, url: &Url, _request: &TokenRequest) -> AuthResult<TokenResponse> {
        debug!(url = %url, path = ?self.path, "using mock token response");
        let body = fs::read_to_string(&self.path).map_err(|e| {
            AuthError::configuration(format!(
                "failed to read mock response {:?}: {}",
                self.path, e
            ))
        })?;
        TokenResponse::from_json(&body)
    }
}

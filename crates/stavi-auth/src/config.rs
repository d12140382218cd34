//! Assertion claims and token retrieval settings.
//!
//! [`AssertionConfig`] is the claim set a provider supplies to the JWT
//! builder. [`AuthSettings`] is the operator-facing, serde-backed section
//! that the CLI reads from `config.toml`:
//!
//! ```toml
//! [auth]
//! secrets_path = "/etc/stavi/secrets.properties"
//! http_timeout_secs = 10
//!
//! [auth.google]
//! issuer = "svc@example.iam.gserviceaccount.com"
//! key_path = "/etc/stavi/private-key.txt"
//! aes_mode = "cbc"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stavi_secrets::{AesMode, SecretStoreOptions};
use url::Url;

use crate::error::{AuthError, AuthResult};
use crate::signing::RS256;

/// Google's OAuth 2.0 token endpoint, also the assertion audience.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Read-only calendar access.
pub const GOOGLE_CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Default connect and request timeout for the token endpoint.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Claims resolved for one provider's assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionConfig {
    pub algorithm: String,
    /// Token endpoint URL; assertions are posted here.
    pub audience: String,
    pub issuer: String,
    /// Space-separated OAuth scopes.
    pub scope: String,
    pub subject: Option<String>,
    /// Not-before, seconds since the epoch.
    pub not_before: Option<i64>,
    pub jwt_id: Option<String>,
}

impl AssertionConfig {
    /// Claims for a Google service account with the default scope.
    pub fn google(issuer: impl Into<String>) -> Self {
        Self {
            algorithm: RS256.to_string(),
            audience: GOOGLE_TOKEN_URL.to_string(),
            issuer: issuer.into(),
            scope: GOOGLE_CALENDAR_SCOPE.to_string(),
            subject: None,
            not_before: None,
            jwt_id: None,
        }
    }

    /// Sets the subject (the user a domain-wide delegated account acts as).
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    #[must_use]
    pub fn with_not_before(mut self, not_before: i64) -> Self {
        self.not_before = Some(not_before);
        self
    }

    #[must_use]
    pub fn with_jwt_id(mut self, jwt_id: impl Into<String>) -> Self {
        self.jwt_id = Some(jwt_id.into());
        self
    }

    /// Checks that the mandatory claims are present and the audience is an
    /// HTTP(S) URL.
    pub fn validate(&self) -> AuthResult<()> {
        for (name, value) in [
            ("algorithm", &self.algorithm),
            ("audience", &self.audience),
            ("issuer", &self.issuer),
            ("scope", &self.scope),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::configuration(format!(
                    "assertion {} must not be empty",
                    name
                )));
            }
        }
        self.audience_url().map(|_| ())
    }

    /// The audience parsed as a URL.
    pub fn audience_url(&self) -> AuthResult<Url> {
        let url = Url::parse(&self.audience).map_err(|e| {
            AuthError::configuration(format!("invalid audience '{}': {}", self.audience, e))
        })?;
        match url.scheme() {
            "https" | "http" => Ok(url),
            other => Err(AuthError::configuration(format!(
                "audience must be an http(s) URL, got scheme '{}'",
                other
            ))),
        }
    }
}

/// How the private-key file is stored on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    /// Base64 of the AES-encrypted, salted key.
    #[default]
    Encrypted,
    /// The key in clear (PEM or base64 PKCS#8). Development only.
    Plain,
}

/// Token retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Path to the key=value secrets file.
    pub secrets_path: Option<PathBuf>,

    /// Keep secrets in memory after the first read.
    pub cache_secrets: bool,

    /// Delete the secrets file after reading it.
    pub delete_secrets_on_load: bool,

    /// Read the secrets file at startup.
    pub eager_load_secrets: bool,

    /// Token endpoint timeout in seconds.
    pub http_timeout_secs: u64,

    /// Google service account settings.
    pub google: GoogleSettings,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secrets_path: None,
            cache_secrets: false,
            delete_secrets_on_load: false,
            eager_load_secrets: false,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            google: GoogleSettings::default(),
        }
    }
}

impl AuthSettings {
    pub fn secret_store_options(&self) -> SecretStoreOptions {
        SecretStoreOptions {
            cache: self.cache_secrets,
            delete_on_load: self.delete_secrets_on_load,
            eager_load: self.eager_load_secrets,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// The secrets file path, required unless the key is stored in clear.
    pub fn require_secrets_path(&self) -> AuthResult<&PathBuf> {
        self.secrets_path
            .as_ref()
            .ok_or_else(|| AuthError::configuration("auth.secrets_path is not set"))
    }
}

/// Google service account settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// Service account email.
    pub issuer: String,
    pub scope: String,
    pub audience: String,
    pub algorithm: String,
    /// User to impersonate, if any.
    pub subject: Option<String>,
    /// Path to the private-key file.
    pub key_path: Option<PathBuf>,
    pub key_format: KeyFormat,
    pub aes_mode: AesMode,
    /// Read the token response from this file instead of calling the endpoint.
    pub mock_response: Option<PathBuf>,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            scope: GOOGLE_CALENDAR_SCOPE.to_string(),
            audience: GOOGLE_TOKEN_URL.to_string(),
            algorithm: RS256.to_string(),
            subject: None,
            key_path: None,
            key_format: KeyFormat::default(),
            aes_mode: AesMode::default(),
            mock_response: None,
        }
    }
}

impl GoogleSettings {
    /// Builds and validates the assertion claims.
    pub fn assertion_config(&self) -> AuthResult<AssertionConfig> {
        let config = AssertionConfig {
            algorithm: self.algorithm.clone(),
            audience: self.audience.clone(),
            issuer: self.issuer.clone(),
            scope: self.scope.clone(),
            subject: self.subject.clone().filter(|s| !s.trim().is_empty()),
            not_before: None,
            jwt_id: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn require_key_path(&self) -> AuthResult<&PathBuf> {
        self.key_path
            .as_ref()
            .ok_or_else(|| AuthError::configuration("auth.google.key_path is not set"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_defaults() {
        let config = AssertionConfig::google("svc@example.iam");
        assert_eq!(config.algorithm, "RS256");
        assert_eq!(config.audience, GOOGLE_TOKEN_URL);
        assert_eq!(config.scope, GOOGLE_CALENDAR_SCOPE);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.audience_url().unwrap().host_str(),
            Some("oauth2.googleapis.com")
        );
    }

    #[test]
    fn missing_mandatory_claims_fail_validation() {
        let config = AssertionConfig::google("");
        assert!(matches!(
            config.validate(),
            Err(AuthError::Configuration(ref msg)) if msg.contains("issuer")
        ));

        let config = AssertionConfig::google("svc").with_scope("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn audience_must_be_http_url() {
        let mut config = AssertionConfig::google("svc");
        config.audience = "not a url".to_string();
        assert!(config.validate().is_err());

        config.audience = "ftp://tokens.example.com".to_string();
        assert!(config.validate().is_err());

        config.audience = "http://127.0.0.1:8080/token".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders_set_optional_claims() {
        let config = AssertionConfig::google("svc")
            .with_subject("user@example.com")
            .with_not_before(1_700_000_000)
            .with_jwt_id("abc-123");
        assert_eq!(config.subject.as_deref(), Some("user@example.com"));
        assert_eq!(config.not_before, Some(1_700_000_000));
        assert_eq!(config.jwt_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn settings_defaults() {
        let settings = AuthSettings::default();
        assert_eq!(settings.http_timeout(), Duration::from_secs(10));
        assert_eq!(settings.secret_store_options(), SecretStoreOptions::default());
        assert!(settings.require_secrets_path().is_err());
        assert_eq!(settings.google.key_format, KeyFormat::Encrypted);
        assert_eq!(settings.google.aes_mode, AesMode::Ecb);
        assert!(settings.google.require_key_path().is_err());
    }

    #[test]
    fn settings_deserialize_with_partial_fields() {
        let json = serde_json::json!({
            "secrets_path": "/etc/stavi/secrets.properties",
            "cache_secrets": true,
            "google": {
                "issuer": "svc@example.iam",
                "subject": "",
                "key_format": "plain",
                "aes_mode": "cbc"
            }
        });
        let settings: AuthSettings = serde_json::from_value(json).unwrap();
        assert!(settings.cache_secrets);
        assert!(!settings.delete_secrets_on_load);
        assert_eq!(settings.http_timeout_secs, 10);
        assert_eq!(settings.google.key_format, KeyFormat::Plain);
        assert_eq!(settings.google.aes_mode, AesMode::Cbc);

        let config = settings.google.assertion_config().unwrap();
        assert_eq!(config.issuer, "svc@example.iam");
        assert_eq!(config.subject, None);
        assert_eq!(config.audience, GOOGLE_TOKEN_URL);
    }

    #[test]
    fn settings_without_issuer_are_rejected() {
        assert!(GoogleSettings::default().assertion_config().is_err());
    }
}

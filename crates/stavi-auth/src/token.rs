//! Bearer access tokens and the keys they are cached under.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::error::{AuthError, AuthResult};

/// Token type reported by the token endpoint.
pub const BEARER: &str = "Bearer";

/// The instant `expires_in_secs` after `now`.
///
/// `expires_in` comes straight from the token endpoint, so a non-positive
/// or unrepresentable value is an invalid response.
pub fn expiry_after(now: DateTime<Utc>, expires_in_secs: i64) -> AuthResult<DateTime<Utc>> {
    if expires_in_secs <= 0 {
        return Err(AuthError::InvalidResponse(format!(
            "expires_in must be positive, got {}",
            expires_in_secs
        )));
    }
    Duration::try_seconds(expires_in_secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AuthError::InvalidResponse(format!("expires_in out of range: {}", expires_in_secs))
        })
}

/// A short-lived bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    scope: String,
    token_type: String,
    expiry: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(
        token: impl Into<String>,
        scope: impl Into<String>,
        token_type: impl Into<String>,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            scope: scope.into(),
            token_type: token_type.into(),
            expiry,
        }
    }

    /// A bearer token that expires `expires_in_secs` from now.
    pub fn bearer(
        token: impl Into<String>,
        scope: impl Into<String>,
        expires_in_secs: i64,
    ) -> AuthResult<Self> {
        let expiry = expiry_after(Utc::now(), expires_in_secs)?;
        Ok(Self::new(token, scope, BEARER, expiry))
    }

    /// The raw token string.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Returns true once the expiry instant has passed.
    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }

    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }

    /// Time left before expiry; negative once expired.
    pub fn time_until_expiry(&self) -> Duration {
        self.expiry - Utc::now()
    }

    /// Value for an HTTP `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.token)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Identifies a retrieval strategy and its cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrategyKey(Cow<'static, str>);

impl StrategyKey {
    /// Google service account tokens.
    pub const GOOGLE: StrategyKey = StrategyKey(Cow::Borrowed("GOOGLE"));

    /// Creates a key; identifiers are case-insensitive.
    pub fn new(id: impl AsRef<str>) -> Self {
        let id = id.as_ref().trim().to_ascii_uppercase();
        if id == "GOOGLE" {
            return Self::GOOGLE;
        }
        Self(Cow::Owned(id))
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    /// Human-readable name used in log messages.
    pub fn display_name(&self) -> &str {
        match self.id() {
            "GOOGLE" => "Google OAuth Token",
            other => other,
        }
    }
}

impl fmt::Display for StrategyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StrategyKey {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

//! Signed JWT assertions in compact serialization.
//!
//! ```text
//! base64url(header) "." base64url(claims) "." base64url(sign(base64url(header) "." base64url(claims)))
//! ```
//!
//! Segments are base64url without padding. An assertion is valid for a
//! fixed hour after it was issued.

use std::fmt;
use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AssertionConfig;
use crate::error::{AuthError, AuthResult};
use crate::signing::SigningStrategy;

/// Lifetime of every assertion, in seconds.
pub const ASSERTION_TTL_SECS: i64 = 3600;

/// JOSE header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

/// Registered claims of a JWT bearer assertion.
///
/// Optional claims are omitted from the JSON when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// A JWT bearer assertion bound to the strategy that signs it.
///
/// The signature is computed on the first call to
/// [`JwtAssertion::to_transmission_ready_token`] and reused afterwards.
pub struct JwtAssertion {
    header: JwtHeader,
    claims: JwtClaims,
    encoded_header: String,
    encoded_claims: String,
    issued: DateTime<Utc>,
    expires: DateTime<Utc>,
    signer: Box<dyn SigningStrategy>,
    signature: OnceLock<String>,
}

impl JwtAssertion {
    /// Builds an assertion issued now.
    pub fn build(config: &AssertionConfig, signer: Box<dyn SigningStrategy>) -> AuthResult<Self> {
        Self::build_at(config, signer, Utc::now())
    }

    /// Builds an assertion issued at `issued`.
    pub fn build_at(
        config: &AssertionConfig,
        signer: Box<dyn SigningStrategy>,
        issued: DateTime<Utc>,
    ) -> AuthResult<Self> {
        config.validate()?;
        if signer.algorithm() != config.algorithm {
            return Err(AuthError::configuration(format!(
                "assertion algorithm {} does not match signer {}",
                config.algorithm,
                signer.algorithm()
            )));
        }

        let expires = issued + Duration::seconds(ASSERTION_TTL_SECS);
        let header = JwtHeader {
            alg: config.algorithm.clone(),
            typ: "JWT".to_string(),
        };
        let claims = JwtClaims {
            iss: config.issuer.clone(),
            scope: config.scope.clone(),
            aud: config.audience.clone(),
            iat: issued.timestamp(),
            exp: expires.timestamp(),
            sub: non_empty(config.subject.as_deref()),
            nbf: config.not_before,
            jti: non_empty(config.jwt_id.as_deref()),
        };

        let encoded_header = encode_segment(&header)?;
        let encoded_claims = encode_segment(&claims)?;
        debug!(iss = %claims.iss, iat = claims.iat, exp = claims.exp, "built JWT assertion");

        Ok(Self {
            header,
            claims,
            encoded_header,
            encoded_claims,
            issued,
            expires,
            signer,
            signature: OnceLock::new(),
        })
    }

    pub fn header(&self) -> &JwtHeader {
        &self.header
    }

    pub fn claims(&self) -> &JwtClaims {
        &self.claims
    }

    pub fn scope(&self) -> &str {
        &self.claims.scope
    }

    /// The token endpoint this assertion is addressed to.
    pub fn audience(&self) -> &str {
        &self.claims.aud
    }

    pub fn issued(&self) -> DateTime<Utc> {
        self.issued
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    pub fn encoded_header(&self) -> &str {
        &self.encoded_header
    }

    pub fn encoded_claims(&self) -> &str {
        &self.encoded_claims
    }

    /// Returns true once the assertion's lifetime is over.
    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }

    /// Returns true if the assertion is no longer valid at `now`.
    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }

    /// Returns the signed compact token.
    pub fn to_transmission_ready_token(&self) -> AuthResult<String> {
        let signing_input = format!("{}.{}", self.encoded_header, self.encoded_claims);
        let signature = match self.signature.get() {
            Some(signature) => signature,
            None => {
                let bytes = self.signer.sign(signing_input.as_bytes())?;
                if bytes.is_empty() {
                    return Err(AuthError::SigningFailure(
                        "empty signature for assertion".to_string(),
                    ));
                }
                // Another thread may have signed concurrently; the result is the same.
                let _ = self.signature.set(URL_SAFE_NO_PAD.encode(bytes));
                self.signature.get().ok_or_else(|| {
                    AuthError::SigningFailure("signature was not stored".to_string())
                })?
            }
        };
        Ok(format!("{}.{}", signing_input, signature))
    }
}

impl PartialEq for JwtAssertion {
    fn eq(&self, other: &Self) -> bool {
        self.encoded_header == other.encoded_header
            && self.encoded_claims == other.encoded_claims
            && self.issued == other.issued
            && self.expires == other.expires
    }
}

impl Eq for JwtAssertion {}

impl fmt::Debug for JwtAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtAssertion")
            .field("header", &self.header)
            .field("claims", &self.claims)
            .field("issued", &self.issued)
            .field("expires", &self.expires)
            .field("signer", &self.signer)
            .field("signed", &self.signature.get().is_some())
            .finish()
    }
}

/// Serializes `value` as JSON and base64url-encodes it without padding.
pub fn encode_segment<T: Serialize>(value: &T) -> AuthResult<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| AuthError::SigningFailure(format!("failed to serialize segment: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decodes one base64url segment back into JSON.
pub fn decode_segment<T: DeserializeOwned>(segment: &str) -> AuthResult<T> {
    let json = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::InvalidResponse(format!("invalid base64url segment: {}", e)))?;
    serde_json::from_slice(&json)
        .map_err(|e| AuthError::InvalidResponse(format!("invalid segment JSON: {}", e)))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

//! Signing strategies for JWT assertions.
//!
//! A [`SigningStrategy`] is built once from [`PrivateKeyMaterial`] and then
//! only holds its parsed key; the key text itself is dropped (and wiped)
//! as soon as construction finishes.
//!
//! Keys arrive as PKCS#8. They are parsed (and so validated) up front and
//! handed to `jsonwebtoken` as PKCS#1 DER for the actual signing.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey};
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{AuthError, AuthResult};

/// The RSASSA-PKCS1-v1_5 with SHA-256 algorithm name.
pub const RS256: &str = "RS256";

/// Private key text recovered from disk, wiped on drop.
///
/// Accepts either a PEM document or base64-encoded PKCS#8 DER.
pub struct PrivateKeyMaterial(Zeroizing<String>);

impl PrivateKeyMaterial {
    pub fn new(text: impl Into<String>) -> Self {
        Self(Zeroizing::new(text.into()))
    }

    /// Hex SHA-256 of the key text, used to notice a key change without
    /// keeping the key around.
    pub fn fingerprint(&self) -> String {
        format!("{:x}", Sha256::digest(self.0.trim().as_bytes()))
    }

    fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Zeroizing<String>> for PrivateKeyMaterial {
    fn from(text: Zeroizing<String>) -> Self {
        Self(text)
    }
}

impl fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateKeyMaterial")
            .field(&"<redacted>")
            .finish()
    }
}

/// Signs byte payloads with a fixed algorithm and key.
pub trait SigningStrategy: Send + Sync + fmt::Debug {
    /// The JWS algorithm name placed in the `alg` header.
    fn algorithm(&self) -> &str;

    /// Signs `payload`.
    ///
    /// An empty signature is never returned; it is reported as
    /// [`AuthError::SigningFailure`] instead.
    fn sign(&self, payload: &[u8]) -> AuthResult<Vec<u8>>;
}

/// RS256 signing with an RSA private key.
pub struct Sha256WithRsaSigningStrategy {
    key: EncodingKey,
}

impl Sha256WithRsaSigningStrategy {
    /// Parses `material` as a PKCS#8 RSA private key.
    pub fn new(material: &PrivateKeyMaterial) -> AuthResult<Self> {
        let text = material.as_str().trim();
        let private = if text.starts_with("-----BEGIN") {
            RsaPrivateKey::from_pkcs8_pem(text)
                .map_err(|e| AuthError::invalid_key(RS256, e.to_string()))?
        } else {
            let compact: Zeroizing<String> = Zeroizing::new(
                text.chars().filter(|c| !c.is_ascii_whitespace()).collect(),
            );
            let der = Zeroizing::new(
                STANDARD
                    .decode(compact.as_bytes())
                    .map_err(|e| AuthError::invalid_key(RS256, e.to_string()))?,
            );
            RsaPrivateKey::from_pkcs8_der(&der)
                .map_err(|e| AuthError::invalid_key(RS256, e.to_string()))?
        };
        let pkcs1 = private
            .to_pkcs1_der()
            .map_err(|e| AuthError::invalid_key(RS256, e.to_string()))?;
        Ok(Self {
            key: EncodingKey::from_rsa_der(pkcs1.as_bytes()),
        })
    }
}

impl fmt::Debug for Sha256WithRsaSigningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sha256WithRsaSigningStrategy")
            .field("algorithm", &RS256)
            .finish_non_exhaustive()
    }
}

impl SigningStrategy for Sha256WithRsaSigningStrategy {
    fn algorithm(&self) -> &str {
        RS256
    }

    fn sign(&self, payload: &[u8]) -> AuthResult<Vec<u8>> {
        let encoded = jsonwebtoken::crypto::sign(payload, &self.key, Algorithm::RS256)
            .map_err(|e| AuthError::SigningFailure(e.to_string()))?;
        let signature = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| AuthError::SigningFailure(format!("malformed signature: {}", e)))?;
        if signature.is_empty() {
            return Err(AuthError::SigningFailure(
                "signer produced an empty signature".to_string(),
            ));
        }
        Ok(signature)
    }
}

/// Builds the signing strategy for a JWS algorithm name.
pub fn for_algorithm(
    algorithm: &str,
    material: &PrivateKeyMaterial,
) -> AuthResult<Box<dyn SigningStrategy>> {
    match algorithm {
        RS256 => Ok(Box::new(Sha256WithRsaSigningStrategy::new(material)?)),
        other => Err(AuthError::UnsupportedAlgorithm(other.to_string())),
    }
}

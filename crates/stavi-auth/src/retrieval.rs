//! Access token retrieval via the JWT bearer grant.
//!
//! One retrieval runs, strictly in order: load the private key, reuse or
//! rebuild the signed assertion, post it to the assertion's audience, and
//! turn the response into an [`AccessToken`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use stavi_core::OperationTimer;
use stavi_secrets::{AesMode, SecretPipeline, SecretStore};
use tracing::{debug, error, info};
use url::Url;

use crate::config::AssertionConfig;
use crate::endpoint::{TokenEndpoint, TokenRequest};
use crate::error::{AuthError, AuthResult};
use crate::jwt::JwtAssertion;
use crate::signing::{self, PrivateKeyMaterial};
use crate::token::{self, AccessToken, BEARER};

/// Obtains a fresh access token.
///
/// Implementations never fail loudly: any error is logged and `None` is
/// returned so the caller can retry on its next cycle.
pub trait AccessTokenRetrievalStrategy: Send + Sync {
    fn retrieve_access_token(&self) -> Option<AccessToken>;
}

/// Where the private key comes from.
#[derive(Debug, Clone)]
pub enum PrivateKeySource {
    /// An encrypted, salted file decoded with the standard secret pipeline.
    Encrypted {
        path: PathBuf,
        store: Arc<SecretStore>,
        mode: AesMode,
    },
    /// A file holding the key in clear.
    Plain { path: PathBuf },
}

impl PrivateKeySource {
    /// Reads the key. Every call builds a new pipeline and returns fresh
    /// material.
    pub fn load(&self) -> AuthResult<PrivateKeyMaterial> {
        let text = match self {
            Self::Encrypted { path, store, mode } => {
                SecretPipeline::standard(path, store, *mode)?.read_string()?
            }
            Self::Plain { path } => SecretPipeline::new(path).read_string()?,
        };
        Ok(PrivateKeyMaterial::from(text))
    }
}

struct CachedAssertion {
    assertion: Arc<JwtAssertion>,
    key_fingerprint: String,
}

/// Retrieves tokens by signing a JWT assertion and exchanging it at the
/// token endpoint.
///
/// The signed assertion is kept and reused until it expires or the private
/// key changes.
pub struct JwtBearerRetrievalStrategy {
    config: AssertionConfig,
    key_source: PrivateKeySource,
    endpoint: Arc<dyn TokenEndpoint>,
    assertion: Mutex<Option<CachedAssertion>>,
}

impl JwtBearerRetrievalStrategy {
    pub fn new(
        config: AssertionConfig,
        key_source: PrivateKeySource,
        endpoint: Arc<dyn TokenEndpoint>,
    ) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            key_source,
            endpoint,
            assertion: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &AssertionConfig {
        &self.config
    }

    /// Runs one retrieval, propagating the cause of any failure.
    pub fn try_retrieve(&self) -> AuthResult<AccessToken> {
        let material = self.key_source.load()?;
        let assertion = self.assertion_for(material, Utc::now())?;
        let request = TokenRequest::jwt_bearer(assertion.to_transmission_ready_token()?);
        let url = Url::parse(assertion.audience())
            .map_err(|e| AuthError::configuration(format!("invalid audience: {}", e)))?;

        let timer = OperationTimer::start("Fetch Access Token");
        let response = self.endpoint.exchange(&url, &request);
        timer.finish();
        let response = response?;

        if let Some(error) = response.error {
            return Err(AuthError::token_exchange(
                error,
                response.error_description.unwrap_or_default(),
            ));
        }

        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("missing access_token".to_string()))?;
        let expires_in = response
            .expires_in
            .ok_or_else(|| AuthError::InvalidResponse("missing expires_in".to_string()))?;
        let scope = response
            .scope
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| assertion.scope().to_string());
        let token_type = response.token_type.unwrap_or_else(|| BEARER.to_string());

        let expiry = token::expiry_after(Utc::now(), expires_in)?;
        Ok(AccessToken::new(token, scope, token_type, expiry))
    }

    /// Returns the cached assertion, rebuilding it if it has expired at
    /// `now` or was built from a different key. `material` is dropped
    /// before this returns.
    fn assertion_for(
        &self,
        material: PrivateKeyMaterial,
        now: DateTime<Utc>,
    ) -> AuthResult<Arc<JwtAssertion>> {
        let fingerprint = material.fingerprint();
        let mut cached = self.assertion.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(ref current) = *cached {
            if current.key_fingerprint == fingerprint && !current.assertion.has_expired_at(now) {
                debug!("reusing cached JWT assertion");
                return Ok(Arc::clone(&current.assertion));
            }
            debug!("cached JWT assertion is stale, rebuilding");
        }

        let signer = signing::for_algorithm(&self.config.algorithm, &material)?;
        drop(material);
        let assertion = Arc::new(JwtAssertion::build(&self.config, signer)?);
        *cached = Some(CachedAssertion {
            assertion: Arc::clone(&assertion),
            key_fingerprint: fingerprint,
        });
        Ok(assertion)
    }
}

impl AccessTokenRetrievalStrategy for JwtBearerRetrievalStrategy {
    fn retrieve_access_token(&self) -> Option<AccessToken> {
        match self.try_retrieve() {
            Ok(token) => {
                info!(
                    scope = %token.scope(),
                    expires_at = %token.expires_at(),
                    "retrieved access token"
                );
                Some(token)
            }
            Err(AuthError::TokenExchange { error, description }) => {
                error!(error = %error, "error retrieving access token: {}", description);
                None
            }
            Err(e) => {
                error!(error = %e, "failed to retrieve access token");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Duration;
    use stavi_secrets::{SecretStoreOptions, seal_to_file};

    use super::*;
    use crate::endpoint::TokenResponse;
    use crate::jwt::{JwtClaims, decode_segment};

    const TEST_KEY: &str = include_str!("../tests/fixtures/test_key.pem");
    const ROTATED_KEY: &str = include_str!("../tests/fixtures/rotated_key.pem");

    #[derive(Debug)]
    struct CountingEndpoint {
        calls: AtomicUsize,
        response: String,
        requests: Mutex<Vec<TokenRequest>>,
    }

    impl CountingEndpoint {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                response: response.to_string(),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn assertions(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.assertion.clone())
                .collect()
        }
    }

    impl TokenEndpoint for CountingEndpoint {
        fn exchange(&self, url: &Url, request: &TokenRequest) -> AuthResult<TokenResponse> {
            assert_eq!(url.as_str(), "https://oauth2.googleapis.com/token");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            TokenResponse::from_json(&self.response)
        }
    }

    fn strategy_with(
        key_path: PathBuf,
        endpoint: Arc<CountingEndpoint>,
    ) -> JwtBearerRetrievalStrategy {
        JwtBearerRetrievalStrategy::new(
            AssertionConfig::google("svc@example.iam"),
            PrivateKeySource::Plain { path: key_path },
            endpoint,
        )
        .unwrap()
    }

    fn write_key(dir: &tempfile::TempDir, key: &str) -> PathBuf {
        let path = dir.path().join("private-key.pem");
        fs::write(&path, key).unwrap();
        path
    }

    #[test]
    fn successful_exchange_builds_token() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = CountingEndpoint::new(r#"{"access_token":"ya29.ok","expires_in":3599}"#);
        let strategy = strategy_with(write_key(&dir, TEST_KEY), Arc::clone(&endpoint));

        let token = strategy.retrieve_access_token().unwrap();
        assert_eq!(token.token(), "ya29.ok");
        assert_eq!(token.token_type(), "Bearer");
        assert_eq!(
            token.scope(),
            "https://www.googleapis.com/auth/calendar.readonly"
        );
        assert!(!token.has_expired());
        assert_eq!(endpoint.calls(), 1);

        let request = &endpoint.requests.lock().unwrap()[0];
        assert_eq!(
            request.grant_type,
            "urn:ietf:params:oauth:grant-type:jwt-bearer"
        );
        let claims: JwtClaims =
            decode_segment(request.assertion.split('.').nth(1).unwrap()).unwrap();
        assert_eq!(claims.iss, "svc@example.iam");
    }

    #[test]
    fn response_scope_wins_over_assertion_scope() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = CountingEndpoint::new(
            r#"{"access_token":"ya29.ok","expires_in":60,"scope":"openid","token_type":"bearer"}"#,
        );
        let strategy = strategy_with(write_key(&dir, TEST_KEY), endpoint);

        let token = strategy.retrieve_access_token().unwrap();
        assert_eq!(token.scope(), "openid");
        assert_eq!(token.token_type(), "bearer");
    }

    #[test]
    fn error_response_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = CountingEndpoint::new(
            r#"{"error":"invalid_grant","error_description":"Invalid JWT Signature."}"#,
        );
        let strategy = strategy_with(write_key(&dir, TEST_KEY), Arc::clone(&endpoint));

        assert!(strategy.retrieve_access_token().is_none());
        assert!(matches!(
            strategy.try_retrieve(),
            Err(AuthError::TokenExchange { ref error, .. }) if error == "invalid_grant"
        ));
        assert_eq!(endpoint.calls(), 2);
    }

    #[test]
    fn incomplete_response_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = CountingEndpoint::new(r#"{"expires_in":60}"#);
        let strategy = strategy_with(write_key(&dir, TEST_KEY), endpoint);
        assert!(matches!(
            strategy.try_retrieve(),
            Err(AuthError::InvalidResponse(_))
        ));
        assert!(strategy.retrieve_access_token().is_none());
    }

    #[test]
    fn unusable_expires_in_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = write_key(&dir, TEST_KEY);
        for expires_in in ["0", "-60", "9000000000000", "9223372036854775807"] {
            let endpoint = CountingEndpoint::new(&format!(
                r#"{{"access_token":"ya29.x","expires_in":{}}}"#,
                expires_in
            ));
            let strategy = strategy_with(key_path.clone(), Arc::clone(&endpoint));

            assert!(
                matches!(strategy.try_retrieve(), Err(AuthError::InvalidResponse(_))),
                "accepted expires_in {}",
                expires_in
            );
            assert!(strategy.retrieve_access_token().is_none());
            assert_eq!(endpoint.calls(), 2);
        }
    }

    #[test]
    fn missing_key_never_reaches_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = CountingEndpoint::new(r#"{"access_token":"x","expires_in":60}"#);
        let strategy = strategy_with(dir.path().join("absent.pem"), Arc::clone(&endpoint));

        assert!(strategy.retrieve_access_token().is_none());
        assert_eq!(endpoint.calls(), 0);
    }

    #[test]
    fn invalid_key_never_reaches_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = CountingEndpoint::new(r#"{"access_token":"x","expires_in":60}"#);
        let strategy = strategy_with(write_key(&dir, "bm90IGEga2V5"), Arc::clone(&endpoint));

        assert!(matches!(
            strategy.try_retrieve(),
            Err(AuthError::InvalidKey { .. })
        ));
        assert_eq!(endpoint.calls(), 0);
    }

    #[test]
    fn assertion_is_reused_until_key_changes() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = CountingEndpoint::new(r#"{"access_token":"x","expires_in":60}"#);
        let key_path = write_key(&dir, TEST_KEY);
        let strategy = strategy_with(key_path.clone(), Arc::clone(&endpoint));

        strategy.retrieve_access_token().unwrap();
        strategy.retrieve_access_token().unwrap();
        fs::write(&key_path, ROTATED_KEY).unwrap();
        strategy.retrieve_access_token().unwrap();

        let assertions = endpoint.assertions();
        assert_eq!(assertions.len(), 3);
        assert_eq!(assertions[0], assertions[1]);
        assert_ne!(assertions[1], assertions[2]);
    }

    #[test]
    fn expired_assertion_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = CountingEndpoint::new("{}");
        let strategy = strategy_with(write_key(&dir, TEST_KEY), endpoint);

        let now = Utc::now();
        let first = strategy
            .assertion_for(PrivateKeyMaterial::new(TEST_KEY), now)
            .unwrap();
        let reused = strategy
            .assertion_for(PrivateKeyMaterial::new(TEST_KEY), now + Duration::minutes(59))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &reused));

        let rebuilt = strategy
            .assertion_for(PrivateKeyMaterial::new(TEST_KEY), now + Duration::hours(2))
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
    }

    #[test]
    fn encrypted_source_matches_plain_key() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("secrets.properties");
        fs::write(
            &secrets,
            "aes.private_key=AAECAwQFBgcICQoLDA0ODw==\n\
             salting_strategy.composition=prepend,reverse,append\n\
             salting_strategy.length=9\n",
        )
        .unwrap();
        let store = Arc::new(SecretStore::open(&secrets, SecretStoreOptions::default()).unwrap());
        let sealed = dir.path().join("private-key.txt");
        seal_to_file(TEST_KEY.as_bytes(), &sealed, &store, AesMode::Ecb).unwrap();

        let source = PrivateKeySource::Encrypted {
            path: sealed,
            store,
            mode: AesMode::Ecb,
        };
        let first = source.load().unwrap();
        let second = source.load().unwrap();
        assert_eq!(first.fingerprint(), PrivateKeyMaterial::new(TEST_KEY).fingerprint());
        assert_eq!(first.fingerprint(), second.fingerprint());
    }
}

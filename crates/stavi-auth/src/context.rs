//! Long-lived owner of the secrets store, transport and token cache.
//!
//! Built once at startup from [`AuthSettings`] and shared by reference with
//! whatever needs tokens.

use std::sync::Arc;

use stavi_secrets::SecretStore;
use tracing::{debug, info};

use crate::cache::AccessTokenCache;
use crate::config::{AuthSettings, GoogleSettings, KeyFormat};
use crate::endpoint::{FileTokenEndpoint, HttpTokenEndpoint, TokenEndpoint};
use crate::error::{AuthError, AuthResult};
use crate::retrieval::{AccessTokenRetrievalStrategy, JwtBearerRetrievalStrategy, PrivateKeySource};
use crate::signing;
use crate::token::{AccessToken, StrategyKey};

/// Token retrieval context.
#[derive(Debug)]
pub struct AuthContext {
    settings: AuthSettings,
    store: Option<Arc<SecretStore>>,
    cache: AccessTokenCache,
}

impl AuthContext {
    /// Opens the secrets store and registers the Google strategy.
    ///
    /// The transport is HTTP unless `google.mock_response` is set.
    pub fn from_settings(settings: &AuthSettings) -> AuthResult<Self> {
        let endpoint: Arc<dyn TokenEndpoint> = match settings.google.mock_response {
            Some(ref path) => {
                info!(path = ?path, "mock token responses enabled");
                Arc::new(FileTokenEndpoint::new(path))
            }
            None => Arc::new(HttpTokenEndpoint::new(settings.http_timeout())?),
        };
        Self::with_endpoint(settings, endpoint)
    }

    /// Like [`AuthContext::from_settings`] with a caller-supplied transport.
    pub fn with_endpoint(
        settings: &AuthSettings,
        endpoint: Arc<dyn TokenEndpoint>,
    ) -> AuthResult<Self> {
        let store = match settings.secrets_path {
            Some(ref path) => Some(Arc::new(SecretStore::open(
                path,
                settings.secret_store_options(),
            )?)),
            None => None,
        };

        let mut cache = AccessTokenCache::new();
        let google = settings.google.clone();
        let google_store = store.clone();
        cache.register_lazy(StrategyKey::GOOGLE, move || {
            let source = key_source(&google, google_store.clone())?;
            let strategy: Arc<dyn AccessTokenRetrievalStrategy> =
                Arc::new(JwtBearerRetrievalStrategy::new(
                    google.assertion_config()?,
                    source,
                    Arc::clone(&endpoint),
                )?);
            Ok(strategy)
        });
        debug!("auth context ready");

        Ok(Self {
            settings: settings.clone(),
            store,
            cache,
        })
    }

    /// Returns a valid token for `key`; see [`AccessTokenCache::retrieve`].
    pub fn access_token(&self, key: &StrategyKey) -> Option<AccessToken> {
        self.cache.retrieve(key)
    }

    pub fn cache(&self) -> &AccessTokenCache {
        &self.cache
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn secret_store(&self) -> Option<&Arc<SecretStore>> {
        self.store.as_ref()
    }

    /// Loads the configured Google key and parses it for the configured
    /// algorithm, without contacting the token endpoint.
    pub fn verify_private_key(&self) -> AuthResult<()> {
        let material = key_source(&self.settings.google, self.store.clone())?.load()?;
        signing::for_algorithm(&self.settings.google.algorithm, &material)?;
        Ok(())
    }
}

/// Resolves where the Google private key is read from.
pub fn key_source(
    google: &GoogleSettings,
    store: Option<Arc<SecretStore>>,
) -> AuthResult<PrivateKeySource> {
    let path = google.require_key_path()?.clone();
    match google.key_format {
        KeyFormat::Plain => Ok(PrivateKeySource::Plain { path }),
        KeyFormat::Encrypted => {
            let store = store.ok_or_else(|| {
                AuthError::configuration("an encrypted key requires auth.secrets_path")
            })?;
            Ok(PrivateKeySource::Encrypted {
                path,
                store,
                mode: google.aes_mode,
            })
        }
    }
}

//! Per-strategy cache of access tokens.
//!
//! A lookup, the refresh it may trigger and the store of the new token all
//! happen under one lock. A caller that arrives while a refresh is in flight
//! waits for it and then sees the fresh token, so a key is never refreshed
//! twice in a row.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::error::AuthResult;
use crate::retrieval::AccessTokenRetrievalStrategy;
use crate::token::{AccessToken, StrategyKey};

type StrategyFactory =
    Box<dyn Fn() -> AuthResult<Arc<dyn AccessTokenRetrievalStrategy>> + Send + Sync>;

/// State of a cache slot at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// A token that is still valid.
    Hit(AccessToken),
    /// Nothing cached yet.
    Miss,
    /// A token is cached but has expired.
    Expired,
}

/// A strategy, constructed on first use.
struct Registration {
    factory: StrategyFactory,
    instance: OnceLock<Arc<dyn AccessTokenRetrievalStrategy>>,
}

impl Registration {
    fn strategy(&self, key: &StrategyKey) -> AuthResult<Arc<dyn AccessTokenRetrievalStrategy>> {
        if let Some(strategy) = self.instance.get() {
            return Ok(Arc::clone(strategy));
        }
        debug!(strategy = %key, "constructing retrieval strategy");
        let strategy = (self.factory)()?;
        Ok(Arc::clone(self.instance.get_or_init(|| strategy)))
    }
}

/// Access tokens keyed by retrieval strategy.
pub struct AccessTokenCache {
    strategies: HashMap<StrategyKey, Registration>,
    tokens: Mutex<HashMap<StrategyKey, AccessToken>>,
}

impl Default for AccessTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AccessTokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&StrategyKey> = self.strategies.keys().collect();
        keys.sort();
        f.debug_struct("AccessTokenCache")
            .field("strategies", &keys)
            .finish_non_exhaustive()
    }
}

impl AccessTokenCache {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Registers an already constructed strategy for `key`.
    pub fn register(&mut self, key: StrategyKey, strategy: Arc<dyn AccessTokenRetrievalStrategy>) {
        let instance = OnceLock::new();
        let _ = instance.set(Arc::clone(&strategy));
        self.insert(
            key,
            Registration {
                factory: Box::new(move || Ok(Arc::clone(&strategy))),
                instance,
            },
        );
    }

    /// Registers a strategy built by `factory` the first time `key` needs a
    /// refresh. A failed construction is retried on the next refresh.
    pub fn register_lazy<F>(&mut self, key: StrategyKey, factory: F)
    where
        F: Fn() -> AuthResult<Arc<dyn AccessTokenRetrievalStrategy>> + Send + Sync + 'static,
    {
        self.insert(
            key,
            Registration {
                factory: Box::new(factory),
                instance: OnceLock::new(),
            },
        );
    }

    fn insert(&mut self, key: StrategyKey, registration: Registration) {
        if self.strategies.insert(key.clone(), registration).is_some() {
            warn!(strategy = %key, "replaced retrieval strategy");
        }
    }

    pub fn is_registered(&self, key: &StrategyKey) -> bool {
        self.strategies.contains_key(key)
    }

    /// Returns a valid token for `key`, refreshing it if needed.
    ///
    /// `None` means no token could be obtained; the cause has been logged.
    pub fn retrieve(&self, key: &StrategyKey) -> Option<AccessToken> {
        self.retrieve_at(key, Utc::now())
    }

    /// Like [`AccessTokenCache::retrieve`], judging expiry at `now`.
    pub fn retrieve_at(&self, key: &StrategyKey, now: DateTime<Utc>) -> Option<AccessToken> {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);

        match Self::lookup_in(&tokens, key, now) {
            CacheLookup::Hit(token) => {
                info!(strategy = %key, "returning cached {}", key.display_name());
                return Some(token);
            }
            CacheLookup::Expired => {
                info!(strategy = %key, "{} expired, retrieving a new token", key.display_name());
            }
            CacheLookup::Miss => {
                info!(strategy = %key, "no cached {}, retrieving a new token", key.display_name());
            }
        }

        let Some(registration) = self.strategies.get(key) else {
            error!(strategy = %key, "no retrieval strategy registered");
            return None;
        };
        let strategy = match registration.strategy(key) {
            Ok(strategy) => strategy,
            Err(e) => {
                error!(strategy = %key, error = %e, "failed to construct retrieval strategy");
                return None;
            }
        };

        let Some(token) = strategy.retrieve_access_token() else {
            warn!(strategy = %key, "could not retrieve {}", key.display_name());
            return None;
        };
        tokens.insert(key.clone(), token.clone());
        debug!(strategy = %key, expires_at = %token.expires_at(), "cached new token");
        Some(token)
    }

    /// Inspects the slot for `key` without refreshing it.
    pub fn lookup(&self, key: &StrategyKey, now: DateTime<Utc>) -> CacheLookup {
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        Self::lookup_in(&tokens, key, now)
    }

    fn lookup_in(
        tokens: &HashMap<StrategyKey, AccessToken>,
        key: &StrategyKey,
        now: DateTime<Utc>,
    ) -> CacheLookup {
        match tokens.get(key) {
            Some(token) if !token.has_expired_at(now) => CacheLookup::Hit(token.clone()),
            Some(_) => CacheLookup::Expired,
            None => CacheLookup::Miss,
        }
    }

    /// Drops the cached token for `key` so the next retrieval refreshes.
    pub fn invalidate(&self, key: &StrategyKey) {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        if tokens.remove(key).is_some() {
            debug!(strategy = %key, "invalidated cached token");
        }
    }
}

//! JWT bearer assertions, access token retrieval and caching.
//!
//! The flow for one refresh:
//!
//! ```text
//! PrivateKeySource ──▶ SigningStrategy ──▶ JwtAssertion ──▶ TokenEndpoint ──▶ AccessTokenCache
//! ```
//!
//! [`AuthContext`] wires these together from [`AuthSettings`]:
//!
//! ```ignore
//! use stavi_auth::{AuthContext, AuthSettings, StrategyKey};
//!
//! let context = AuthContext::from_settings(&AuthSettings::default())?;
//! if let Some(token) = context.access_token(&StrategyKey::GOOGLE) {
//!     request.header("Authorization", token.authorization_header());
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod jwt;
pub mod retrieval;
pub mod signing;
pub mod token;

pub use cache::{AccessTokenCache, CacheLookup};
pub use config::{
    AssertionConfig, AuthSettings, DEFAULT_HTTP_TIMEOUT_SECS, GOOGLE_CALENDAR_SCOPE,
    GOOGLE_TOKEN_URL, GoogleSettings, KeyFormat,
};
pub use context::{AuthContext, key_source};
pub use endpoint::{
    FileTokenEndpoint, HttpTokenEndpoint, JWT_BEARER_GRANT_TYPE, TokenEndpoint, TokenRequest,
    TokenResponse,
};
pub use error::{AuthError, AuthResult};
pub use jwt::{ASSERTION_TTL_SECS, JwtAssertion, JwtClaims, JwtHeader, decode_segment, encode_segment};
pub use retrieval::{AccessTokenRetrievalStrategy, JwtBearerRetrievalStrategy, PrivateKeySource};
pub use signing::{PrivateKeyMaterial, RS256, Sha256WithRsaSigningStrategy, SigningStrategy};
pub use token::{AccessToken, BEARER, StrategyKey};

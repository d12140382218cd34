//! `stavi token`: retrieve an access token.

use stavi_auth::{AccessToken, AuthContext, StrategyKey};
use tracing::debug;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Retrieves a token for `strategy` and prints it.
pub fn run(config: &CliConfig, strategy: &str, show: bool) -> CliResult<()> {
    let key = StrategyKey::new(strategy);
    let context = AuthContext::from_settings(&config.auth)?;
    debug!(strategy = %key, "requesting access token");

    let token = context
        .access_token(&key)
        .ok_or_else(|| CliError::NoToken(key.display_name().to_string()))?;
    print!("{}", render(&key, &token, show));
    Ok(())
}

/// Formats a token summary; the raw token only when `show` is set.
pub fn render(key: &StrategyKey, token: &AccessToken, show: bool) -> String {
    let mut out = format!(
        "{}\n  type:    {}\n  scope:   {}\n  expires: {} ({}s left)\n",
        key.display_name(),
        token.token_type(),
        token.scope(),
        token.expires_at().to_rfc3339(),
        token.time_until_expiry().num_seconds().max(0)
    );
    if show {
        out.push_str(&format!("  token:   {}\n", token.token()));
    }
    out
}

//! `stavi check-key`: make sure the configured private key can be used.

use stavi_auth::AuthContext;

use crate::config::CliConfig;
use crate::error::CliResult;

/// Runs the key source and builds the signing strategy. Nothing about the
/// key is printed.
pub fn run(config: &CliConfig) -> CliResult<()> {
    let context = AuthContext::from_settings(&config.auth)?;
    context.verify_private_key()?;
    println!(
        "private key OK ({}, {:?})",
        config.auth.google.algorithm, config.auth.google.key_format
    );
    Ok(())
}

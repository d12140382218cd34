//! `stavi seal`: provision an encrypted, salted file.

use std::fs;
use std::path::Path;

use stavi_secrets::{SecretStore, seal_to_file};
use tracing::info;
use zeroize::Zeroizing;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Seals `input` into `output` with the configured AES key, IV and salting.
pub fn run(config: &CliConfig, input: &Path, output: &Path) -> CliResult<()> {
    let secrets_path = config.auth.require_secrets_path()?;
    let store = SecretStore::open(secrets_path, config.auth.secret_store_options())?;
    let plaintext = Zeroizing::new(fs::read(input).map_err(|e| CliError::io(input, e))?);

    let mode = config.auth.google.aes_mode;
    seal_to_file(&plaintext, output, &store, mode)?;
    info!(input = ?input, output = ?output, mode = %mode, "sealed file");
    println!("sealed {} -> {} ({})", input.display(), output.display(), mode);
    Ok(())
}

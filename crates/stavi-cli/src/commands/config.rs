//! Configuration commands.

use std::path::Path;

use crate::config::CliConfig;
use crate::error::CliResult;

/// Dump the effective configuration to stdout.
pub fn dump(config: &CliConfig, source: &Path) -> CliResult<()> {
    let toml_str = config.to_toml()?;
    println!("# config.toml ({})", source.display());
    println!("{}", toml_str);
    Ok(())
}

/// Show the configuration file path.
pub fn path(source: &Path) -> CliResult<()> {
    println!("config: {}", source.display());
    Ok(())
}

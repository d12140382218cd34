//! CLI configuration.
//!
//! All settings live in `~/.config/stavi/config.toml` by default:
//!
//! ```toml
//! log_file = "/var/log/stavi.log"
//!
//! [auth]
//! secrets_path = "/etc/stavi/secrets.properties"
//!
//! [auth.google]
//! issuer = "svc@example.iam.gserviceaccount.com"
//! key_path = "/etc/stavi/private-key.txt"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stavi_auth::AuthSettings;

use crate::error::{CliError, CliResult};

/// Configuration for the `stavi` binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Debug logging.
    pub debug: bool,

    /// Append logs to this file instead of stderr.
    pub log_file: Option<PathBuf>,

    /// Token retrieval settings.
    pub auth: AuthSettings,
}

impl CliConfig {
    /// Loads the default file, or defaults if it does not exist.
    pub fn load() -> CliResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> CliResult<Self> {
        toml::from_str(content)
            .map_err(|e| CliError::Config(format!("failed to parse config: {}", e)))
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> CliResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("failed to serialize config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stavi")
    }
}

#[cfg(test)]
mod tests {
    use stavi_auth::KeyFormat;
    use stavi_secrets::AesMode;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = CliConfig::parse("").unwrap();
        assert!(!config.debug);
        assert_eq!(config.auth.http_timeout_secs, 10);
        assert!(config.auth.secrets_path.is_none());
    }

    #[test]
    fn parses_nested_auth_tables() {
        let config = CliConfig::parse(
            r#"
debug = true

[auth]
secrets_path = "/etc/stavi/secrets.properties"
delete_secrets_on_load = true
http_timeout_secs = 3

[auth.google]
issuer = "svc@example.iam"
key_path = "/etc/stavi/private-key.txt"
key_format = "encrypted"
aes_mode = "cbc"
"#,
        )
        .unwrap();

        assert!(config.debug);
        assert!(config.auth.delete_secrets_on_load);
        assert_eq!(config.auth.http_timeout_secs, 3);
        assert_eq!(config.auth.google.issuer, "svc@example.iam");
        assert_eq!(config.auth.google.key_format, KeyFormat::Encrypted);
        assert_eq!(config.auth.google.aes_mode, AesMode::Cbc);
        assert_eq!(
            config.auth.google.scope,
            "https://www.googleapis.com/auth/calendar.readonly"
        );
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(matches!(
            CliConfig::parse("[auth\nsecrets_path = 1"),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            CliConfig::parse("[auth.google]\naes_mode = \"gcm\""),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn dump_round_trips() {
        let mut config = CliConfig::default();
        config.auth.google.issuer = "svc@example.iam".to_string();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[auth.google]"));

        let back = CliConfig::parse(&text).unwrap();
        assert_eq!(back.auth.google.issuer, "svc@example.iam");
    }

    #[test]
    fn load_from_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CliConfig::load_from(&dir.path().join("absent.toml")),
            Err(CliError::Io { .. })
        ));
    }

    #[test]
    fn default_path_ends_with_config_toml() {
        let path = CliConfig::default_path();
        assert!(path.ends_with("stavi/config.toml"));
    }
}

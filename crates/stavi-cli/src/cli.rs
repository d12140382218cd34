//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stavi_core::TracingOutputFormat;

/// stavi - service account tokens and sealed key files
#[derive(Debug, Parser)]
#[command(name = "stavi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "STAVI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log format: pretty, compact or json
    #[arg(long, global = true)]
    pub log_format: Option<TracingOutputFormat>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Retrieve an access token
    Token {
        /// Retrieval strategy
        #[arg(long, default_value = "GOOGLE")]
        strategy: String,

        /// Print the raw token
        #[arg(long)]
        show: bool,
    },

    /// Encrypt and salt a file with the configured secrets
    Seal {
        /// Plaintext file, such as a PKCS#8 private key
        #[arg(long, short)]
        input: PathBuf,

        /// Where to write the sealed file
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Decrypt the configured private key and check that it parses
    CheckKey,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Dump,
    /// Print the configuration file path
    Path,
}

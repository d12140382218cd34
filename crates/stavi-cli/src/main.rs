//! stavi CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use stavi_core::{TracingConfig, init_tracing};
use tracing::Level;

use stavi_cli::cli::{Cli, Command, ConfigAction};
use stavi_cli::commands;
use stavi_cli::config::CliConfig;
use stavi_cli::error::CliResult;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(CliConfig::default_path);
    let config = match cli.config {
        Some(ref path) => CliConfig::load_from(path)?,
        None => CliConfig::load()?,
    };

    init_tracing(tracing_config(&cli, &config))?;

    match cli.command {
        Command::Token { strategy, show } => commands::token::run(&config, &strategy, show),
        Command::Seal { input, output } => commands::seal::run(&config, &input, &output),
        Command::CheckKey => commands::check_key::run(&config),
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}

fn tracing_config(cli: &Cli, config: &CliConfig) -> TracingConfig {
    let mut tracing = if cli.debug || config.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default().with_level(Level::WARN)
    };
    if let Some(format) = cli.log_format {
        tracing = tracing.with_format(format);
    }
    if let Some(ref path) = config.log_file {
        tracing = tracing.with_log_file(path.clone());
    }
    tracing
}

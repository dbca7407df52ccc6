//! bucketsync CLI - Mirror a local folder onto an S3-compatible bucket
//!
//! Provides commands for:
//! - Reconciling and then continuously watching a folder (`run`)
//! - A one-shot reconciliation pass (`reconcile`)
//! - Inspecting and creating the configuration file
//! - Generating shell completions

use std::path::PathBuf;

use anyhow::Result;
use bucketsync_core::config::{Config, LoggingConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    completions::CompletionsCommand, config::ConfigCommand, reconcile::ReconcileCommand,
    run::RunCommand, CommandContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "bucketsync",
    version,
    about = "Keep a local folder mirrored onto an S3-compatible bucket"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile the folder, then mirror every change until interrupted
    Run(RunCommand),
    /// Upload every local file once and exit
    Reconcile(ReconcileCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Installs the global tracing subscriber
///
/// `RUST_LOG` wins when set. Otherwise the level comes from the config file,
/// raised by `-v`/`-vv` and lowered to `warn` by `--quiet`.
fn init_tracing(logging: &LoggingConfig, verbose: u8, quiet: bool) {
    let level = match verbose {
        0 if quiet => "warn",
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    // Commands report a malformed file themselves; logging just falls back
    let logging = Config::load_or_default(&config_path).logging;
    init_tracing(&logging, cli.verbose, cli.quiet);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let ctx = CommandContext {
        config_path,
        format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Run(cmd) => cmd.execute(&ctx).await,
        Commands::Reconcile(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["bucketsync", "reconcile", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_run_accepts_remote_flags() {
        let cli = Cli::try_parse_from([
            "bucketsync",
            "run",
            "--endpoint",
            "localhost:9000",
            "--bucket",
            "mirror",
            "--folder",
            "/tmp/mirror",
            "--ssl",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(cmd) => {
                let overrides = cmd.remote.overrides();
                assert_eq!(overrides.endpoint.as_deref(), Some("localhost:9000"));
                assert_eq!(overrides.bucket.as_deref(), Some("mirror"));
                assert_eq!(overrides.folder, Some(PathBuf::from("/tmp/mirror")));
                assert!(overrides.use_ssl);
                assert!(overrides.secret_key.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

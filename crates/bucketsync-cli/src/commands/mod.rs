//! Subcommands and the plumbing they share
//!
//! Every command receives a [`CommandContext`]. Commands that talk to the
//! store go through [`CommandContext::load_validated`], which refuses to
//! continue unless the merged configuration is complete.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bucketsync_core::config::{Config, ConfigOverrides};
use clap::{Args, CommandFactory};
use tracing::{debug, error};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

pub mod completions;
pub mod config;
pub mod reconcile;
pub mod run;

/// Global settings resolved from the command line
#[derive(Debug)]
pub struct CommandContext {
    /// Configuration file in effect (`--config` or the default path)
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    /// Loads the configuration file; a missing file yields defaults
    pub fn load_config(&self) -> Result<Config> {
        Config::load_optional(&self.config_path).with_context(|| {
            format!(
                "Failed to load configuration from {}",
                self.config_path.display()
            )
        })
    }

    /// Loads the file, merges `args` over it, and validates the result
    ///
    /// On validation failure every error and the usage text are printed
    /// and an error is returned. Nothing has touched the network or the
    /// sync folder at that point.
    pub fn load_validated(&self, args: &RemoteArgs) -> Result<Config> {
        let config = self.load_config()?.with_overrides(&args.overrides());
        let errors = config.validate();

        if errors.is_empty() {
            debug!(config = ?config.redacted(), "Configuration accepted");
            return Ok(config);
        }

        for e in &errors {
            error!(field = %e.field, message = %e.message, "Invalid configuration");
        }

        let formatter = self.formatter();
        if self.format == OutputFormat::Json {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": false,
                "config_path": self.config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else {
            for e in &errors {
                formatter.error(&e.to_string());
            }
            eprintln!();
            eprintln!("{}", crate::Cli::command().render_help());
        }

        anyhow::bail!(
            "configuration is incomplete ({} error{})",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        )
    }
}

/// Connection and folder flags shared by `run` and `reconcile`
///
/// Each flag left unset (or blank) is taken from the config file.
#[derive(Debug, Default, Args)]
pub struct RemoteArgs {
    /// Object store host and optional port, e.g. `localhost:9000`
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Access key ID
    #[arg(long)]
    pub access_key: Option<String>,

    /// Secret access key
    #[arg(long)]
    pub secret_key: Option<String>,

    /// Bucket to mirror into
    #[arg(long)]
    pub bucket: Option<String>,

    /// Local folder to mirror
    #[arg(long)]
    pub folder: Option<PathBuf>,

    /// Connect over HTTPS
    #[arg(long)]
    pub ssl: bool,

    /// Region used for request signing
    #[arg(long)]
    pub region: Option<String>,
}

impl RemoteArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            bucket: self.bucket.clone(),
            folder: self.folder.clone(),
            use_ssl: self.ssl,
            region: self.region.clone(),
        }
    }
}

//! Config command - View and manage bucketsync configuration
//!
//! Provides the `bucketsync config` CLI command which:
//! 1. Shows the current configuration with the secret key masked
//! 2. Validates the configuration file and reports errors
//! 3. Writes a starter configuration file

use std::io::Write;

use anyhow::{Context, Result};
use bucketsync_core::config::Config;
use clap::Subcommand;
use tracing::info;

use super::CommandContext;
use crate::output::OutputFormat;

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
    /// Write a starter configuration file (never overwrites)
    Init,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
            ConfigCommand::Init => self.execute_init(ctx),
        }
    }

    fn execute_show(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?.redacted();

        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.format == OutputFormat::Json {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;

            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    fn execute_validate(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;

        if !config_path.exists() {
            if ctx.format == OutputFormat::Json {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": ["Configuration file not found"],
                }));
            } else {
                formatter.error(&format!(
                    "Configuration file not found at {}",
                    config_path.display()
                ));
                formatter.info("Run 'bucketsync config init' to create one.");
            }
            anyhow::bail!("configuration file not found");
        }

        let config = Config::load(config_path).with_context(|| {
            format!("Failed to parse configuration {}", config_path.display())
        })?;

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = config.validate();

        if ctx.format == OutputFormat::Json {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            for error in &errors {
                eprintln!("  {} - {}", error.field, error.message);
            }
        }

        if !errors.is_empty() {
            anyhow::bail!("configuration is invalid");
        }
        Ok(())
    }

    fn execute_init(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create configuration directory")?;
        }

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(config_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                formatter.error(&format!(
                    "{} already exists; not overwriting",
                    config_path.display()
                ));
                anyhow::bail!("configuration file already exists");
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to create {}", config_path.display())
                })
            }
        };

        file.write_all(render_template()?.as_bytes())
            .context("Failed to write configuration file")?;

        info!(config_path = %config_path.display(), "Configuration template written");

        if ctx.format == OutputFormat::Json {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Wrote {}", config_path.display()));
            formatter.info("Fill in the remote section and sync.folder, then run 'bucketsync run'.");
        }

        Ok(())
    }
}

/// Starter file: the default configuration with a short header
fn render_template() -> Result<String> {
    let body =
        serde_yaml::to_string(&Config::default()).context("Failed to serialize configuration")?;
    Ok(format!(
        "# bucketsync configuration\n\
         #\n\
         # remote.endpoint is host[:port] without a scheme; set remote.use_ssl for HTTPS.\n\
         # Command-line flags override any value set here.\n\
         {body}"
    ))
}

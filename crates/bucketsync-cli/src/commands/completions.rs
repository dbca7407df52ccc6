//! Shell completions generation command
//!
//! Usage: `bucketsync completions bash > ~/.local/share/bash-completion/completions/bucketsync`

use std::io;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;

use super::CommandContext;

/// Arguments for the completions subcommand
#[derive(Debug, clap::Args)]
pub struct CompletionsCommand {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsCommand {
    /// Print completions for the chosen shell to stdout
    pub async fn execute(&self, _ctx: &CommandContext) -> Result<()> {
        let mut cmd = crate::Cli::command();
        clap_complete::generate(self.shell, &mut cmd, "bucketsync", &mut io::stdout());
        Ok(())
    }
}

//! `hawkctl config ...`

use anyhow::Result;
use clap::Subcommand;
use hawk_core::HawkConfig;
use std::io::Write;

/// Configuration commands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the validated configuration as TOML
    Show,
}

/// Run a configuration command
pub fn run(command: &ConfigCommand, config: &HawkConfig, out: &mut impl Write) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let rendered = config.to_toml_string()?;
            write!(out, "{rendered}")?;
        }
    }
    Ok(())
}

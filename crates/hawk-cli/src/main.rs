//! hawkctl
//!
//! Inspect the permission policies and configuration of the repository layer.

use anyhow::Result;
use clap::{Parser, Subcommand};
use hawk_cli::commands::{self, config::ConfigCommand, policy::PolicyCommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "hawkctl")]
#[command(about = "Inspect repository permission policies and configuration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Permission policy table
    #[command(subcommand)]
    Policy(PolicyCommand),

    /// Effective configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Policy(cmd) => {
            if !commands::policy::run(&cmd, &config, &mut stdout)? {
                return Ok(ExitCode::from(commands::policy::DENIED_EXIT_CODE));
            }
        }
        Commands::Config(cmd) => {
            commands::config::run(&cmd, &config, &mut stdout)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

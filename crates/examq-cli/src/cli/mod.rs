//! CLI for the examq task scheduler.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use examq_core::config::{self, ExamqConfig};
use std::path::PathBuf;

use commands::{run_classify, run_config, run_simulate};

/// Top-level CLI for examq.
#[derive(Debug, Parser)]
#[command(name = "examq")]
#[command(about = "examq: priority task scheduler for rate-limited completion calls", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the XDG config path.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Classify a service error as rate-limited, transient or fatal.
    Classify {
        /// Error message returned by the service.
        message: String,
        /// Numeric status code (e.g. 429, 500).
        #[arg(long)]
        status: Option<u16>,
        /// Status token (e.g. RESOURCE_EXHAUSTED).
        #[arg(long)]
        code: Option<String>,
    },

    /// Run a scripted scenario file through the scheduler.
    Simulate {
        /// Path to the scenario TOML file.
        path: PathBuf,
        /// Override the concurrency limit (default: scenario, then config).
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
    },

    /// Show the effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = load_config(cli.config.as_deref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Classify {
                message,
                status,
                code,
            } => run_classify(&cfg, &message, status, code.as_deref()),
            CliCommand::Simulate { path, concurrency } => {
                run_simulate(&cfg, &path, concurrency).await?
            }
            CliCommand::Config => run_config(&cfg, cli.config.as_deref())?,
        }

        Ok(())
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<ExamqConfig> {
    match path {
        Some(p) => config::load_from_path(p),
        None => config::load_or_init(),
    }
}

#[cfg(test)]
mod tests;

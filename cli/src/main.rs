// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Agora Operator CLI
//!
//! The `agora` binary inspects container manifests and runs small networks
//! of containers inside one process.
//!
//! ## Commands
//!
//! - `agora config show|validate|generate` - Configuration management
//! - `agora run --config <FILE>...` - Boot containers on an in-process network

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use agora_cli::commands::{self, ConfigCommand, RunArgs};
use agora_core::domain::container_config::{ContainerConfigManifest, LoggingConfig};

/// Agora - hierarchical multi-agent control runtime
#[derive(Parser)]
#[command(name = "agora")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); overrides the manifest
    #[arg(long, global = true, env = "AGORA_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Boot containers on an in-process network and report skill states
    #[command(name = "run")]
    Run(RunArgs),
}

impl Cli {
    /// Manifest whose `observability.logging` section configures output.
    fn logging_manifest(&self) -> Option<PathBuf> {
        match &self.command {
            Some(Commands::Run(args)) => args.configs.first().cloned(),
            Some(Commands::Config {
                command: ConfigCommand::Show { config, .. },
            }) => config.clone().or_else(ContainerConfigManifest::discover_config),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = cli
        .logging_manifest()
        .and_then(|path| ContainerConfigManifest::from_yaml_file(path).ok())
        .and_then(|manifest| manifest.logging().cloned());
    init_logging(cli.log_level.as_deref(), logging.as_ref())?;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command).await,
        Some(Commands::Run(args)) => commands::run::execute(args).await,
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
///
/// `RUST_LOG` wins over `--log-level`, which wins over the manifest.
fn init_logging(level: Option<&str>, logging: Option<&LoggingConfig>) -> Result<()> {
    let level = level
        .map(str::to_string)
        .or_else(|| logging.map(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if logging.is_some_and(|l| l.format.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

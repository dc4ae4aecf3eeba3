// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use agora_core::domain::container_config::ContainerConfigManifest;
use agora_core::domain::node::nickname_of;
use agora_core::domain::skill_factory::SkillFactory;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Path to config file (default: discover)
        #[arg(short, long, env = "AGORA_CONFIG_PATH", value_name = "FILE")]
        config: Option<PathBuf>,

        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./agora-config.yaml)
        #[arg(short, long, default_value = "./agora-config.yaml")]
        output: PathBuf,

        /// Include a network singleton node and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show { config, paths } => show(config, paths).await,
        ConfigCommand::Validate { file } => validate(file).await,
        ConfigCommand::Generate { output, examples } => generate(&output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ContainerConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config / AGORA_CONFIG_PATH: {}", path.display()),
            None => println!("  1. --config / AGORA_CONFIG_PATH: {}", "(not set)".dimmed()),
        }
        println!("  2. ./agora-config.yaml");
        println!("  3. ~/.agora/config.yaml");
        println!("  4. /etc/agora/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Container:".bold());
    println!("  Name: {}", config.spec.container.name);
    println!("  Founding: {}", config.spec.container.founding);
    println!("  Reply timeout: {}ms", config.spec.messaging.reply_timeout_ms);
    println!();

    println!("{}", "Nodes:".bold());
    if config.spec.nodes.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for node in &config.spec.nodes {
        let agent = nickname_of(&node.name);
        let singleton = if node.network_singleton { " [network singleton]" } else { "" };
        println!("  {}{}", node.name.bold(), singleton);
        for role in &node.roles {
            let remote = if role.remote_communications_permitted { " (remote)" } else { "" };
            println!("    {}.{}.{}{}", config.spec.container.name, agent, role.name, remote);
            let skills: Vec<&str> = role.skills.iter().map(String::as_str).collect();
            println!("      Skills: {}", skills.join(", "));
            if let Some(parent) = &role.parent {
                println!("      Parent: {}", parent);
            }
            for child in &role.children {
                println!("      Child: {}", child);
            }
        }
    }
    println!();

    println!("{}", "Singleton Agent Hosts:".bold());
    match &config.spec.singleton_agent_hosts {
        Some(hosts) if !hosts.hosts.is_empty() => {
            for (agent, container) in &hosts.hosts {
                println!("  {} -> {}", agent, container);
            }
        }
        _ => println!("  {}", "(none)".dimmed()),
    }
    println!();

    Ok(())
}

/// Skill classes declared in `config` that `factory` cannot create.
pub fn unknown_skill_classes(config: &ContainerConfigManifest, factory: &SkillFactory) -> Vec<String> {
    let mut unknown: Vec<String> = config
        .spec
        .nodes
        .iter()
        .flat_map(|node| node.roles.iter())
        .flat_map(|role| role.skills.iter())
        .filter(|class| !factory.contains(class))
        .cloned()
        .collect();
    unknown.sort();
    unknown.dedup();
    unknown
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ContainerConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    let unknown = unknown_skill_classes(&config, &agora_swarm::skill_factory());
    if !unknown.is_empty() {
        println!(
            "{}",
            format!("! Skill classes not provided by this build: {}", unknown.join(", ")).yellow()
        );
    }

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/container-with-examples.yaml")
    } else {
        include_str!("../../templates/container-minimal.yaml")
    };

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process network run
//!
//! Boots every listed container on one [`InProcessNetwork`], sharing a key
//! store and an event bus, initializes them in the order given and reports
//! each role's skill states once the network has settled.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use agora_core::application::{build_container, start_container, NodeRuntime, RoleStatus, RuntimeCollaborators};
use agora_core::domain::container_config::ContainerConfigManifest;
use agora_core::domain::events::RuntimeEvent;
use agora_core::domain::skill::SkillState;
use agora_core::infrastructure::{Ed25519CryptoProvider, EventBus, InMemoryKeyStore, InProcessNetwork};

#[derive(Args)]
pub struct RunArgs {
    /// Container manifests; the first should be the founding container
    #[arg(short, long = "config", value_name = "FILE", required = true)]
    pub configs: Vec<PathBuf>,

    /// How long to let messages flow before reporting
    #[arg(long, default_value_t = 500)]
    pub settle_ms: u64,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn load_manifests(paths: &[PathBuf]) -> Result<Vec<ContainerConfigManifest>> {
    paths
        .iter()
        .map(|path| {
            ContainerConfigManifest::from_yaml_file(path)
                .with_context(|| format!("Failed to load config at {:?}", path))
        })
        .collect()
}

/// The containers of one in-process network, started.
pub struct InProcessRun {
    pub runtimes: Vec<Arc<NodeRuntime>>,
    pub joins: usize,
    pub refusals: usize,
}

pub async fn boot(manifests: &[ContainerConfigManifest], settle: Duration) -> Result<InProcessRun> {
    if let Some(first) = manifests.first() {
        if !first.spec.container.founding {
            warn!(container = %first.spec.container.name, "First container is not founding");
        }
    }

    let network = Arc::new(InProcessNetwork::new());
    let keys = Arc::new(InMemoryKeyStore::new());
    let events = Arc::new(EventBus::with_default_capacity());
    let factory = Arc::new(agora_swarm::skill_factory());
    let mut subscriber = events.subscribe();

    let mut runtimes = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        let runtime = build_container(
            manifest,
            RuntimeCollaborators {
                skill_factory: factory.clone(),
                crypto: Arc::new(Ed25519CryptoProvider::new()),
                certificates: keys.clone(),
                credentials: keys.clone(),
                transport: network.clone(),
                events: events.clone(),
            },
        )?;
        network.attach(&runtime);
        runtimes.push(runtime);
    }

    for runtime in &runtimes {
        start_container(runtime)?;
    }
    tokio::time::sleep(settle).await;

    let mut joins = 0;
    let mut refusals = 0;
    while let Ok(event) = subscriber.try_recv() {
        match event {
            RuntimeEvent::RoleJoined { .. } => joins += 1,
            RuntimeEvent::OperationNotPermitted { .. } => refusals += 1,
            _ => {}
        }
    }
    info!(containers = runtimes.len(), joins, refusals, "In-process network settled");

    Ok(InProcessRun {
        runtimes,
        joins,
        refusals,
    })
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let manifests = load_manifests(&args.configs)?;
    let run = boot(&manifests, Duration::from_millis(args.settle_ms)).await?;

    let statuses: Vec<RoleStatus> = run.runtimes.iter().flat_map(|runtime| runtime.role_statuses()).collect();

    if args.json {
        let report = serde_json::json!({
            "joins": run.joins,
            "refusals": run.refusals,
            "roles": statuses,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Role skill states:".bold());
    for status in &statuses {
        println!("  {}", status.role.to_string().bold());
        for (skill, state) in &status.skills {
            let state = match state {
                SkillState::Ready => state.to_string().green(),
                SkillState::IsolatedFromNetwork => state.to_string().yellow(),
                SkillState::Uninitialized => state.to_string().dimmed(),
            };
            println!("    {}: {}", skill, state);
        }
    }
    println!();
    println!("Joins: {}  Refused operations: {}", run.joins, run.refusals);

    Ok(())
}

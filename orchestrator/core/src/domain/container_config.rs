// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Container Configuration Types
//
// Defines the configuration schema for one Agora container, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Container identity and founding flag
// - Node and role definitions (the agent hierarchy hosted here)
// - The network singleton hosting table
// - Messaging and observability settings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::node::{nickname_of, NodeDefinition};
use crate::domain::qualified_name::is_valid_segment;
use crate::domain::role::RoleDefinition;
use crate::domain::singleton_hosts::{SingletonAgentHosts, SingletonHostsError};

pub const API_VERSION: &str = "agora.dev/v1";
pub const KIND: &str = "ContainerConfig";

/// Top-level Kubernetes-style container configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfigManifest {
    /// API version (must be "agora.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ContainerConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ContainerConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfigSpec {
    pub container: ContainerIdentity,

    /// Agent hierarchy hosted by this container
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,

    /// Omitted means "no network singletons"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singleton_agent_hosts: Option<SingletonHostsSpec>,

    #[serde(default)]
    pub messaging: MessagingConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerIdentity {
    /// Container segment of every hosted qualified name
    pub name: String,

    /// Whether this container founded the network
    #[serde(default)]
    pub founding: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Node name, conventionally ending in "Agent"
    pub name: String,

    #[serde(default)]
    pub mission: String,

    #[serde(default)]
    pub network_singleton: bool,

    #[serde(default)]
    pub roles: Vec<RoleDefinition>,
}

impl NodeSpec {
    pub fn definition(&self) -> NodeDefinition {
        NodeDefinition {
            name: self.name.clone(),
            mission: self.mission.clone(),
            network_singleton: self.network_singleton,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingletonHostsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<DateTime<Utc>>,

    /// Agent name -> hosting container name
    #[serde(default)]
    pub hosts: BTreeMap<String, String>,
}

impl SingletonHostsSpec {
    pub fn to_table(&self) -> Result<SingletonAgentHosts, SingletonHostsError> {
        SingletonAgentHosts::new(
            self.hosts.clone(),
            self.effective.unwrap_or(DateTime::<Utc>::MIN_UTC),
            self.termination.unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Default deadline for replies a skill waits on
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    /// Fan out to child roles on separate tasks
    #[serde(default = "default_true")]
    pub propagate_on_separate_tasks: bool,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: default_reply_timeout_ms(),
            propagate_on_separate_tasks: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_true() -> bool {
    true
}

fn default_reply_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ContainerConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .map(|h| h.replace('.', "-"))
            .filter(|h| is_valid_segment(h))
            .unwrap_or_else(|| "agora-container".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname.clone(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: ContainerConfigSpec {
                container: ContainerIdentity {
                    name: hostname,
                    founding: true,
                },
                nodes: vec![],
                singleton_agent_hosts: None,
                messaging: MessagingConfig::default(),
                observability: None,
            },
        }
    }
}

impl ContainerConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. AGORA_CONFIG_PATH environment variable
    /// 2. ./agora-config.yaml (working directory)
    /// 3. ~/.agora/config.yaml (user home)
    /// 4. /etc/agora/config.yaml (system, Unix) or C:\ProgramData\Agora\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("AGORA_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./agora-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".agora").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/agora/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Agora\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("AGORA_CONTAINER_NAME") {
            tracing::info!("Environment override: AGORA_CONTAINER_NAME={}", name);
            self.spec.container.name = name;
        }

        if let Some(val) = lookup("AGORA_FOUNDING_CONTAINER") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: AGORA_FOUNDING_CONTAINER=true");
                    self.spec.container.founding = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: AGORA_FOUNDING_CONTAINER=false");
                    self.spec.container.founding = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for AGORA_FOUNDING_CONTAINER: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Some(val) = lookup("AGORA_REPLY_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => {
                    tracing::info!("Environment override: AGORA_REPLY_TIMEOUT_MS={}", ms);
                    self.spec.messaging.reply_timeout_ms = ms;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for AGORA_REPLY_TIMEOUT_MS: '{}'. Expected a positive integer. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if !is_valid_segment(&self.spec.container.name) {
            anyhow::bail!(
                "spec.container.name '{}' must be non-empty and contain no dots or whitespace",
                self.spec.container.name
            );
        }

        if self.spec.messaging.reply_timeout_ms == 0 {
            anyhow::bail!("spec.messaging.reply_timeout_ms must be positive");
        }

        let mut nicknames = BTreeSet::new();
        for node in &self.spec.nodes {
            if !is_valid_segment(&node.name) {
                anyhow::bail!("Invalid node name: '{}'", node.name);
            }
            if !nicknames.insert(nickname_of(&node.name)) {
                anyhow::bail!("Duplicate node name: '{}'", node.name);
            }
            if node.roles.is_empty() {
                anyhow::bail!("Node '{}' must declare at least one role", node.name);
            }

            let mut role_names = BTreeSet::new();
            for role in &node.roles {
                if !is_valid_segment(&role.name) {
                    anyhow::bail!("Invalid role name '{}' in node '{}'", role.name, node.name);
                }
                if !role_names.insert(role.name.as_str()) {
                    anyhow::bail!("Duplicate role '{}' in node '{}'", role.name, node.name);
                }
                if role.skills.iter().any(|skill| skill.trim().is_empty()) {
                    anyhow::bail!("Role '{}' declares an empty skill class", role.name);
                }
            }
        }

        if let Some(hosts) = &self.spec.singleton_agent_hosts {
            hosts
                .to_table()
                .map_err(|e| anyhow::anyhow!("Invalid spec.singleton_agent_hosts: {}", e))?;
        }

        Ok(())
    }

    /// Hosting table for this container; empty when none is configured.
    pub fn singleton_table(&self) -> Result<SingletonAgentHosts, SingletonHostsError> {
        match &self.spec.singleton_agent_hosts {
            Some(hosts) => hosts.to_table(),
            None => Ok(SingletonAgentHosts::empty()),
        }
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.spec.messaging.reply_timeout_ms)
    }

    pub fn logging(&self) -> Option<&LoggingConfig> {
        self.spec.observability.as_ref().and_then(|o| o.logging.as_ref())
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Network Singleton Hosting Table
//!
//! A network singleton is a logical agent whose physical host container may
//! change over the life of the network. [`SingletonAgentHosts`] is an
//! immutable snapshot mapping each singleton agent name to the container that
//! hosts it right now, together with the window in which the snapshot is
//! valid.
//!
//! Two different "misses" must never be confused:
//!
//! | Situation | Result |
//! |-----------|--------|
//! | Agent name absent from a loaded table | Not a singleton; the address is used unchanged |
//! | No table loaded yet | [`SingletonHostsError::NotLoaded`], a startup failure |
//!
//! Tables are replaced whole through [`SingletonHostsRegistry::replace`];
//! readers never observe a partially updated mapping.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::qualified_name::{is_valid_segment, QualifiedName, QualifiedNameError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SingletonHostsError {
    #[error("Singleton hosting table validity window is empty: effective {effective} is not before termination {termination}")]
    InvalidWindow {
        effective: DateTime<Utc>,
        termination: DateTime<Utc>,
    },

    #[error("Invalid singleton host entry {agent} -> {container}")]
    InvalidEntry { agent: String, container: String },

    #[error("No singleton hosting table has been loaded")]
    NotLoaded,

    #[error(transparent)]
    QualifiedName(#[from] QualifiedNameError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingletonAgentHosts {
    hosts: BTreeMap<String, String>,
    effective: DateTime<Utc>,
    termination: DateTime<Utc>,
}

impl SingletonAgentHosts {
    pub fn new(
        hosts: BTreeMap<String, String>,
        effective: DateTime<Utc>,
        termination: DateTime<Utc>,
    ) -> Result<Self, SingletonHostsError> {
        if effective >= termination {
            return Err(SingletonHostsError::InvalidWindow { effective, termination });
        }
        if let Some((agent, container)) = hosts
            .iter()
            .find(|(agent, container)| !is_valid_segment(agent) || !is_valid_segment(container))
        {
            return Err(SingletonHostsError::InvalidEntry {
                agent: agent.clone(),
                container: container.clone(),
            });
        }
        Ok(Self {
            hosts,
            effective,
            termination,
        })
    }

    /// A table valid for all representable time.
    pub fn unbounded(hosts: BTreeMap<String, String>) -> Result<Self, SingletonHostsError> {
        Self::new(hosts, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
    }

    pub fn empty() -> Self {
        Self {
            hosts: BTreeMap::new(),
            effective: DateTime::<Utc>::MIN_UTC,
            termination: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn hosts(&self) -> &BTreeMap<String, String> {
        &self.hosts
    }

    pub fn effective(&self) -> DateTime<Utc> {
        self.effective
    }

    pub fn termination(&self) -> DateTime<Utc> {
        self.termination
    }

    /// Container currently hosting `agent`, if `agent` is a network singleton.
    pub fn host_of(&self, agent: &str) -> Option<&str> {
        self.hosts.get(agent).map(String::as_str)
    }

    pub fn is_network_singleton(&self, agent: &str) -> bool {
        self.hosts.contains_key(agent)
    }

    pub fn is_in_effect(&self, at: DateTime<Utc>) -> bool {
        self.effective <= at && at < self.termination
    }

    /// Rewrites an address of a singleton agent to its live host. Only the
    /// container segment changes; other agents pass through unchanged.
    pub fn map_network_singleton(&self, name: &QualifiedName) -> Result<QualifiedName, QualifiedNameError> {
        match self.host_of(name.agent_name()) {
            Some(host) if host != name.container_name() => name.with_container(host),
            _ => Ok(name.clone()),
        }
    }
}

/// Holder of the current table for one container.
#[derive(Debug, Default)]
pub struct SingletonHostsRegistry {
    current: RwLock<Option<Arc<SingletonAgentHosts>>>,
}

impl SingletonHostsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded(table: SingletonAgentHosts) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(table))),
        }
    }

    /// Installs `table` atomically and returns the previous one.
    pub fn replace(&self, table: SingletonAgentHosts) -> Option<Arc<SingletonAgentHosts>> {
        self.current.write().replace(Arc::new(table))
    }

    pub fn current(&self) -> Result<Arc<SingletonAgentHosts>, SingletonHostsError> {
        self.current.read().clone().ok_or(SingletonHostsError::NotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn map_network_singleton(&self, name: &QualifiedName) -> Result<QualifiedName, SingletonHostsError> {
        Ok(self.current()?.map_network_singleton(name)?)
    }
}

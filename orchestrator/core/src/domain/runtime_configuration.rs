// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Per-container registry of nodes and roles.
//!
//! Nodes live in an arena keyed by [`NodeId`]; roles point back to their node
//! by id only. Lookups by nickname, role id and qualified name go through
//! indexes built lazily from the arena. Every index has its own lock and is
//! dropped whenever a node is added or removed.
//!
//! Lock order is always arena first, then index. An index is built and stored
//! while the arena read lock is held, so a concurrent mutation can never leave
//! a stale index behind. Two readers racing to build the same index store
//! identical content; the last one wins.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::domain::node::{Node, NodeId};
use crate::domain::qualified_name::QualifiedName;
use crate::domain::role::{Role, RoleId};

#[derive(Debug, Error)]
pub enum RuntimeConfigurationError {
    #[error("Node {node} belongs to container {actual}, not {expected}")]
    ContainerMismatch {
        node: String,
        expected: String,
        actual: String,
    },

    #[error("A node with nickname '{0}' is already registered")]
    DuplicateNickname(String),

    #[error("Role {0} is already registered")]
    DuplicateRole(QualifiedName),
}

type Index<K, V> = RwLock<Option<Arc<HashMap<K, V>>>>;

#[derive(Debug)]
pub struct NodeRuntimeConfiguration {
    container_name: String,
    nodes: RwLock<BTreeMap<NodeId, Arc<Node>>>,
    by_nickname: Index<String, NodeId>,
    by_role_id: Index<RoleId, Arc<Role>>,
    by_qualified_name: Index<QualifiedName, Arc<Role>>,
}

impl NodeRuntimeConfiguration {
    pub fn new(container_name: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
            nodes: RwLock::new(BTreeMap::new()),
            by_nickname: RwLock::new(None),
            by_role_id: RwLock::new(None),
            by_qualified_name: RwLock::new(None),
        }
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn add_node(&self, node: Arc<Node>) -> Result<(), RuntimeConfigurationError> {
        if node.container_name() != self.container_name {
            return Err(RuntimeConfigurationError::ContainerMismatch {
                node: node.name().to_string(),
                expected: self.container_name.clone(),
                actual: node.container_name().to_string(),
            });
        }

        let mut nodes = self.nodes.write();
        if nodes.values().any(|existing| existing.nickname() == node.nickname()) {
            return Err(RuntimeConfigurationError::DuplicateNickname(node.nickname().to_string()));
        }
        let known: Vec<&QualifiedName> = nodes
            .values()
            .flat_map(|existing| existing.roles().iter().map(|role| role.qualified_name()))
            .collect();
        if let Some(role) = node.roles().iter().find(|role| known.contains(&role.qualified_name())) {
            return Err(RuntimeConfigurationError::DuplicateRole(role.qualified_name().clone()));
        }

        debug!(container = %self.container_name, node = %node.name(), "Node registered");
        nodes.insert(node.id(), node);
        self.invalidate_indexes();
        Ok(())
    }

    pub fn remove_node(&self, id: &NodeId) -> Option<Arc<Node>> {
        let mut nodes = self.nodes.write();
        let removed = nodes.remove(id);
        if removed.is_some() {
            self.invalidate_indexes();
        }
        removed
    }

    // Caller holds the arena write lock.
    fn invalidate_indexes(&self) {
        *self.by_nickname.write() = None;
        *self.by_role_id.write() = None;
        *self.by_qualified_name.write() = None;
    }

    pub fn node(&self, id: &NodeId) -> Option<Arc<Node>> {
        self.nodes.read().get(id).cloned()
    }

    /// All nodes, ordered by id.
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.read().values().cloned().collect()
    }

    pub fn roles(&self) -> Vec<Arc<Role>> {
        self.nodes
            .read()
            .values()
            .flat_map(|node| node.roles().iter().cloned())
            .collect()
    }

    pub fn node_by_nickname(&self, nickname: &str) -> Option<Arc<Node>> {
        let id = *self.nickname_index().get(nickname)?;
        self.node(&id)
    }

    pub fn role(&self, id: &RoleId) -> Option<Arc<Role>> {
        self.role_id_index().get(id).cloned()
    }

    pub fn role_by_qualified_name(&self, name: &QualifiedName) -> Option<Arc<Role>> {
        self.qualified_name_index().get(name).cloned()
    }

    fn nickname_index(&self) -> Arc<HashMap<String, NodeId>> {
        Self::lazy(&self.nodes, &self.by_nickname, |nodes| {
            nodes
                .values()
                .map(|node| (node.nickname().to_string(), node.id()))
                .collect()
        })
    }

    fn role_id_index(&self) -> Arc<HashMap<RoleId, Arc<Role>>> {
        Self::lazy(&self.nodes, &self.by_role_id, |nodes| {
            nodes
                .values()
                .flat_map(|node| node.roles().iter().map(|role| (role.id(), role.clone())))
                .collect()
        })
    }

    fn qualified_name_index(&self) -> Arc<HashMap<QualifiedName, Arc<Role>>> {
        Self::lazy(&self.nodes, &self.by_qualified_name, |nodes| {
            nodes
                .values()
                .flat_map(|node| {
                    node.roles()
                        .iter()
                        .map(|role| (role.qualified_name().clone(), role.clone()))
                })
                .collect()
        })
    }

    fn lazy<K, V>(
        nodes: &RwLock<BTreeMap<NodeId, Arc<Node>>>,
        index: &Index<K, V>,
        build: impl FnOnce(&BTreeMap<NodeId, Arc<Node>>) -> HashMap<K, V>,
    ) -> Arc<HashMap<K, V>> {
        if let Some(built) = index.read().as_ref() {
            return built.clone();
        }
        let nodes = nodes.read();
        let built = Arc::new(build(&nodes));
        *index.write() = Some(built.clone());
        built
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::NodeDefinition;
    use crate::domain::role::RoleDefinition;
    use std::thread;

    fn node(container: &str, name: &str, agent: &str, roles: &[&str]) -> Arc<Node> {
        let roles = roles
            .iter()
            .map(|role| Arc::new(Role::new(container, agent, RoleDefinition::new(*role)).unwrap()))
            .collect();
        Node::new(
            container,
            NodeDefinition {
                name: name.to_string(),
                mission: String::new(),
                network_singleton: false,
            },
            roles,
        )
        .unwrap()
    }

    #[test]
    fn test_lookups_after_registration() {
        let configuration = NodeRuntimeConfiguration::new("A");
        let mint = node("A", "MintAgent", "Mint", &["MintRole", "AuditRole"]);
        configuration.add_node(mint.clone()).unwrap();

        assert_eq!(configuration.node_by_nickname("Mint").unwrap().id(), mint.id());
        let role = configuration
            .role_by_qualified_name(&QualifiedName::parse("A.Mint.AuditRole").unwrap())
            .unwrap();
        assert_eq!(configuration.role(&role.id()).unwrap().qualified_name(), role.qualified_name());
        assert_eq!(configuration.roles().len(), 2);
    }

    #[test]
    fn test_indexes_follow_mutation() {
        let configuration = NodeRuntimeConfiguration::new("A");
        configuration.add_node(node("A", "MintAgent", "Mint", &["MintRole"])).unwrap();
        assert!(configuration.node_by_nickname("Alice").is_none());

        let alice = node("A", "AliceAgent", "Alice", &["AliceRole"]);
        configuration.add_node(alice.clone()).unwrap();
        assert!(configuration.node_by_nickname("Alice").is_some());

        configuration.remove_node(&alice.id());
        assert!(configuration.node_by_nickname("Alice").is_none());
        assert!(configuration
            .role_by_qualified_name(&QualifiedName::parse("A.Alice.AliceRole").unwrap())
            .is_none());
    }

    #[test]
    fn test_rejects_foreign_and_duplicate_nodes() {
        let configuration = NodeRuntimeConfiguration::new("A");
        assert!(matches!(
            configuration.add_node(node("B", "MintAgent", "Mint", &["MintRole"])),
            Err(RuntimeConfigurationError::ContainerMismatch { .. })
        ));

        configuration.add_node(node("A", "MintAgent", "Mint", &["MintRole"])).unwrap();
        assert!(matches!(
            configuration.add_node(node("A", "Mint", "Mint", &["OtherRole"])),
            Err(RuntimeConfigurationError::DuplicateNickname(_))
        ));
    }

    #[test]
    fn test_concurrent_lazy_population() {
        let configuration = Arc::new(NodeRuntimeConfiguration::new("A"));
        for i in 0..8 {
            let name = format!("Worker{}Agent", i);
            let agent = format!("Worker{}", i);
            configuration.add_node(node("A", &name, &agent, &["WorkRole"])).unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let configuration = configuration.clone();
                thread::spawn(move || {
                    let name = QualifiedName::parse(&format!("A.Worker{}.WorkRole", i)).unwrap();
                    configuration.role_by_qualified_name(&name).is_some()
                        && configuration.node_by_nickname(&format!("Worker{}", i)).is_some()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}

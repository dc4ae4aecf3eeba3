// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Nodes group roles under one logical agent name.
//!
//! A node's name carries the agent-type suffix (`MintAgent`); its nickname
//! (`Mint`) is the agent segment of every owned role's qualified name. The
//! node also owns the state bindings its skills share.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::qualified_name::is_valid_segment;
use crate::domain::role::Role;

const AGENT_SUFFIX: &str = "Agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Stable id for `name` hosted in `container`.
    pub fn derive(container: &str, name: &str) -> Self {
        Self(Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("node:{}.{}", container, name).as_bytes(),
        ))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Invalid node name '{0}'")]
    InvalidName(String),

    #[error("Node {0} must own at least one role")]
    NoRoles(String),

    #[error("Role {role} does not belong to node {node}")]
    ForeignRole { node: String, role: String },

    #[error("Role {role} is already bound to another node")]
    AlreadyBound { role: String },

    #[error("State variable '{variable}' is not declared by any role of node {node}")]
    UndeclaredStateVariable { node: String, variable: String },
}

/// Persistent description of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    #[serde(default)]
    pub mission: String,
    #[serde(default)]
    pub network_singleton: bool,
}

/// Strips a trailing `Agent` suffix: `MintAgent` becomes `Mint`.
pub fn nickname_of(name: &str) -> &str {
    match name.strip_suffix(AGENT_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => name,
    }
}

pub struct Node {
    id: NodeId,
    container_name: String,
    definition: NodeDefinition,
    roles: Vec<Arc<Role>>,
    declared_state_variables: BTreeSet<String>,
    state_bindings: RwLock<HashMap<String, serde_json::Value>>,
}

impl Node {
    /// Assembles a node and binds every role to it.
    pub fn new(
        container_name: &str,
        definition: NodeDefinition,
        roles: Vec<Arc<Role>>,
    ) -> Result<Arc<Self>, NodeError> {
        if !is_valid_segment(&definition.name) {
            return Err(NodeError::InvalidName(definition.name));
        }
        if roles.is_empty() {
            return Err(NodeError::NoRoles(definition.name));
        }

        let nickname = nickname_of(&definition.name);
        for role in &roles {
            let name = role.qualified_name();
            if name.agent_name() != nickname || name.container_name() != container_name {
                return Err(NodeError::ForeignRole {
                    node: definition.name.clone(),
                    role: name.to_string(),
                });
            }
        }

        let declared_state_variables = roles
            .iter()
            .flat_map(|role| role.definition().state_variables.iter().cloned())
            .collect();

        let node = Arc::new(Self {
            id: NodeId::derive(container_name, &definition.name),
            container_name: container_name.to_string(),
            definition,
            roles,
            declared_state_variables,
            state_bindings: RwLock::new(HashMap::new()),
        });

        for role in &node.roles {
            role.bind_node(node.id).map_err(|_| NodeError::AlreadyBound {
                role: role.qualified_name().to_string(),
            })?;
        }
        Ok(node)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn nickname(&self) -> &str {
        nickname_of(&self.definition.name)
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn mission(&self) -> &str {
        &self.definition.mission
    }

    pub fn is_network_singleton(&self) -> bool {
        self.definition.network_singleton
    }

    pub fn definition(&self) -> &NodeDefinition {
        &self.definition
    }

    pub fn roles(&self) -> &[Arc<Role>] {
        &self.roles
    }

    pub fn role(&self, role_name: &str) -> Option<&Arc<Role>> {
        self.roles
            .iter()
            .find(|role| role.qualified_name().role_name() == role_name)
    }

    pub fn declared_state_variables(&self) -> &BTreeSet<String> {
        &self.declared_state_variables
    }

    /// Sets a shared state variable. Only names declared by an owned role are accepted.
    pub fn bind_state(&self, variable: &str, value: serde_json::Value) -> Result<Option<serde_json::Value>, NodeError> {
        if !self.declared_state_variables.contains(variable) {
            return Err(NodeError::UndeclaredStateVariable {
                node: self.definition.name.clone(),
                variable: variable.to_string(),
            });
        }
        Ok(self.state_bindings.write().insert(variable.to_string(), value))
    }

    pub fn state(&self, variable: &str) -> Option<serde_json::Value> {
        self.state_bindings.read().get(variable).cloned()
    }

    pub fn unbind_state(&self, variable: &str) -> Option<serde_json::Value> {
        self.state_bindings.write().remove(variable)
    }

    pub fn state_snapshot(&self) -> HashMap<String, serde_json::Value> {
        self.state_bindings.read().clone()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("container", &self.container_name)
            .field("name", &self.definition.name)
            .field("roles", &self.roles.iter().map(|r| r.qualified_name().as_str()).collect::<Vec<_>>())
            .finish()
    }
}

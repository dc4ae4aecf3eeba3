// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Definition Store - Application Layer
//!
//! Persists the definitions behind a running container through the three
//! repository contracts. Composite records are written after their parts and
//! removed before them:
//!
//! ```text
//! persist: roles ──► node ──► configuration
//! remove:  configuration ──► node ──► roles
//! ```
//!
//! Nodes and roles are visited in name order and every id is derived from a
//! name, so persisting the same configuration twice rewrites the same records.

use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::node::{Node, NodeDefinition, NodeId};
use crate::domain::repository::{
    ConfigurationId, NodeRecord, NodeRepository, PersistenceContext, RepositoryError, RoleRecord, RoleRepository,
    RuntimeConfigurationRecord, RuntimeConfigurationRepository,
};
use crate::domain::role::RoleDefinition;
use crate::domain::runtime_configuration::NodeRuntimeConfiguration;

/// A node definition restored together with its role definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNode {
    pub definition: NodeDefinition,
    pub roles: Vec<RoleDefinition>,
}

pub struct DefinitionStore {
    roles: Arc<dyn RoleRepository>,
    nodes: Arc<dyn NodeRepository>,
    configurations: Arc<dyn RuntimeConfigurationRepository>,
}

impl DefinitionStore {
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        nodes: Arc<dyn NodeRepository>,
        configurations: Arc<dyn RuntimeConfigurationRepository>,
    ) -> Self {
        Self {
            roles,
            nodes,
            configurations,
        }
    }

    pub async fn persist_configuration(
        &self,
        configuration: &NodeRuntimeConfiguration,
    ) -> Result<ConfigurationId, RepositoryError> {
        let context = PersistenceContext::new(configuration.container_name());

        let mut nodes = configuration.nodes();
        nodes.sort_by(|a, b| a.name().cmp(b.name()));

        let mut node_ids = Vec::with_capacity(nodes.len());
        for node in &nodes {
            node_ids.push(self.persist_node(node, &context).await?);
        }

        let id = ConfigurationId::derive(configuration.container_name());
        let saved = self
            .configurations
            .save(
                RuntimeConfigurationRecord {
                    id,
                    container: configuration.container_name().to_string(),
                    nodes: node_ids,
                    saved_at: context.at,
                },
                &context,
            )
            .await?;

        info!(container = %configuration.container_name(), nodes = nodes.len(), "Runtime configuration persisted");
        Ok(saved)
    }

    pub async fn persist_node(&self, node: &Node, context: &PersistenceContext) -> Result<NodeId, RepositoryError> {
        let mut roles: Vec<_> = node.roles().to_vec();
        roles.sort_by(|a, b| a.definition().name.cmp(&b.definition().name));

        let mut role_ids = Vec::with_capacity(roles.len());
        for role in &roles {
            let id = self
                .roles
                .save(
                    RoleRecord {
                        id: role.id(),
                        qualified_name: role.qualified_name().clone(),
                        definition: role.definition().clone(),
                        saved_at: context.at,
                    },
                    context,
                )
                .await?;
            role_ids.push(id);
        }

        let id = self
            .nodes
            .save(
                NodeRecord {
                    id: node.id(),
                    container: node.container_name().to_string(),
                    definition: node.definition().clone(),
                    roles: role_ids,
                    saved_at: context.at,
                },
                context,
            )
            .await?;
        debug!(node = %node.name(), roles = roles.len(), "Node persisted");
        Ok(id)
    }

    /// Removes a configuration and everything it references. Absent records are skipped.
    pub async fn remove_configuration(&self, id: ConfigurationId) -> Result<(), RepositoryError> {
        let record = match self.configurations.load(id).await {
            Ok(record) => record,
            Err(RepositoryError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        self.configurations.delete(id).await?;
        for node in record.nodes.iter().rev() {
            self.remove_node(*node).await?;
        }
        info!(container = %record.container, "Runtime configuration removed");
        Ok(())
    }

    pub async fn remove_node(&self, id: NodeId) -> Result<(), RepositoryError> {
        let record = match self.nodes.load(id).await {
            Ok(record) => record,
            Err(RepositoryError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        self.nodes.delete(id).await?;
        for role in record.roles.iter().rev() {
            self.roles.delete(*role).await?;
        }
        Ok(())
    }

    /// Reads back every node definition of a stored configuration, in stored order.
    pub async fn load_configuration(&self, id: ConfigurationId) -> Result<Vec<StoredNode>, RepositoryError> {
        let record = self.configurations.load(id).await?;
        let mut nodes = Vec::with_capacity(record.nodes.len());
        for node_id in record.nodes {
            let node = self.nodes.load(node_id).await?;
            let mut roles = Vec::with_capacity(node.roles.len());
            for role_id in node.roles {
                roles.push(self.roles.load(role_id).await?.definition);
            }
            nodes.push(StoredNode {
                definition: node.definition,
                roles,
            });
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::role::{Role, RoleId};
    use crate::infrastructure::repositories::{
        InMemoryNodeRepository, InMemoryRoleRepository, InMemoryRuntimeConfigurationRepository,
    };

    fn configuration() -> NodeRuntimeConfiguration {
        let configuration = NodeRuntimeConfiguration::new("Mint");
        for (node, roles) in [("TreasuryAgent", vec!["VaultRole", "AuditRole"]), ("MintAgent", vec!["MintRole"])] {
            let agent = crate::domain::node::nickname_of(node);
            let roles = roles
                .into_iter()
                .map(|name| Arc::new(Role::new("Mint", agent, RoleDefinition::new(name)).unwrap()))
                .collect();
            let definition = NodeDefinition {
                name: node.to_string(),
                mission: String::new(),
                network_singleton: false,
            };
            configuration
                .add_node(Node::new("Mint", definition, roles).unwrap())
                .unwrap();
        }
        configuration
    }

    fn store() -> (DefinitionStore, Arc<InMemoryRoleRepository>) {
        let roles = Arc::new(InMemoryRoleRepository::new());
        let store = DefinitionStore::new(
            roles.clone(),
            Arc::new(InMemoryNodeRepository::new()),
            Arc::new(InMemoryRuntimeConfigurationRepository::new()),
        );
        (store, roles)
    }

    #[tokio::test]
    async fn test_persist_then_load_in_name_order() {
        let (store, _) = store();
        let id = store.persist_configuration(&configuration()).await.unwrap();
        assert_eq!(id, ConfigurationId::derive("Mint"));

        let nodes = store.load_configuration(id).await.unwrap();
        let names: Vec<&str> = nodes.iter().map(|n| n.definition.name.as_str()).collect();
        assert_eq!(names, vec!["MintAgent", "TreasuryAgent"]);
        let treasury: Vec<&str> = nodes[1].roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(treasury, vec!["AuditRole", "VaultRole"]);
    }

    #[tokio::test]
    async fn test_repeated_persist_is_idempotent() {
        let (store, roles) = store();
        let configuration = configuration();
        let first = store.persist_configuration(&configuration).await.unwrap();
        let second = store.persist_configuration(&configuration).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(roles.len(), 3);
    }

    #[tokio::test]
    async fn test_remove_cascades_to_roles() {
        let (store, roles) = store();
        let id = store.persist_configuration(&configuration()).await.unwrap();
        store.remove_configuration(id).await.unwrap();

        assert_eq!(roles.len(), 0);
        let vault = RoleId::derive(&crate::domain::qualified_name::QualifiedName::parse("Mint.Treasury.VaultRole").unwrap());
        assert!(matches!(roles.load(vault).await, Err(RepositoryError::NotFound(_))));
        assert!(matches!(store.load_configuration(id).await, Err(RepositoryError::NotFound(_))));

        // Removing again is a no-op.
        store.remove_configuration(id).await.unwrap();
    }
}

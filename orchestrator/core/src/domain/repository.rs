// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for the definition aggregates. The runtime owns live
//! roles and nodes; what gets stored is their definition, keyed by a stable id.
//!
//! | Trait | Record | Implementations |
//! |-------|--------|----------------|
//! | `RoleRepository` | `RoleRecord` | `InMemoryRoleRepository` |
//! | `NodeRepository` | `NodeRecord` | `InMemoryNodeRepository` |
//! | `RuntimeConfigurationRepository` | `RuntimeConfigurationRecord` | `InMemoryRuntimeConfigurationRepository` |
//!
//! Composite records reference their parts by id. Cascading a save or delete
//! through the parts is the job of `crate::application::definition_store`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::node::{NodeDefinition, NodeId};
use crate::domain::qualified_name::QualifiedName;
use crate::domain::role::{RoleDefinition, RoleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigurationId(pub Uuid);

impl ConfigurationId {
    pub fn derive(container: &str) -> Self {
        Self(Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("configuration:{}", container).as_bytes(),
        ))
    }
}

/// Who is persisting, and when.
#[derive(Debug, Clone)]
pub struct PersistenceContext {
    pub container: String,
    pub at: DateTime<Utc>,
}

impl PersistenceContext {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub qualified_name: QualifiedName,
    pub definition: RoleDefinition,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub container: String,
    pub definition: NodeDefinition,
    pub roles: Vec<RoleId>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfigurationRecord {
    pub id: ConfigurationId,
    pub container: String,
    pub nodes: Vec<NodeId>,
    pub saved_at: DateTime<Utc>,
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn load(&self, id: RoleId) -> Result<RoleRecord, RepositoryError>;

    /// Creates or replaces the record.
    async fn save(&self, record: RoleRecord, context: &PersistenceContext) -> Result<RoleId, RepositoryError>;

    /// Deleting an absent record is not an error.
    async fn delete(&self, id: RoleId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NodeRepository: Send + Sync {
    async fn load(&self, id: NodeId) -> Result<NodeRecord, RepositoryError>;

    async fn save(&self, record: NodeRecord, context: &PersistenceContext) -> Result<NodeId, RepositoryError>;

    async fn delete(&self, id: NodeId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RuntimeConfigurationRepository: Send + Sync {
    async fn load(&self, id: ConfigurationId) -> Result<RuntimeConfigurationRecord, RepositoryError>;

    async fn save(
        &self,
        record: RuntimeConfigurationRecord,
        context: &PersistenceContext,
    ) -> Result<ConfigurationId, RepositoryError>;

    async fn delete(&self, id: ConfigurationId) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

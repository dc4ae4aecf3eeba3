// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::node::NodeId;
use crate::domain::repository::{
    ConfigurationId, NodeRecord, NodeRepository, PersistenceContext, RepositoryError, RoleRecord, RoleRepository,
    RuntimeConfigurationRecord, RuntimeConfigurationRepository,
};
use crate::domain::role::RoleId;

#[derive(Clone, Default)]
pub struct InMemoryRoleRepository {
    roles: Arc<Mutex<HashMap<RoleId, RoleRecord>>>,
}

impl InMemoryRoleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.roles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.lock().is_empty()
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn load(&self, id: RoleId) -> Result<RoleRecord, RepositoryError> {
        self.roles
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("role {}", id)))
    }

    async fn save(&self, record: RoleRecord, _context: &PersistenceContext) -> Result<RoleId, RepositoryError> {
        let id = record.id;
        self.roles.lock().insert(id, record);
        Ok(id)
    }

    async fn delete(&self, id: RoleId) -> Result<(), RepositoryError> {
        self.roles.lock().remove(&id);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNodeRepository {
    nodes: Arc<Mutex<HashMap<NodeId, NodeRecord>>>,
}

impl InMemoryNodeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }
}

#[async_trait]
impl NodeRepository for InMemoryNodeRepository {
    async fn load(&self, id: NodeId) -> Result<NodeRecord, RepositoryError> {
        self.nodes
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("node {}", id)))
    }

    async fn save(&self, record: NodeRecord, _context: &PersistenceContext) -> Result<NodeId, RepositoryError> {
        let id = record.id;
        self.nodes.lock().insert(id, record);
        Ok(id)
    }

    async fn delete(&self, id: NodeId) -> Result<(), RepositoryError> {
        self.nodes.lock().remove(&id);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryRuntimeConfigurationRepository {
    configurations: Arc<Mutex<HashMap<ConfigurationId, RuntimeConfigurationRecord>>>,
}

impl InMemoryRuntimeConfigurationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuntimeConfigurationRepository for InMemoryRuntimeConfigurationRepository {
    async fn load(&self, id: ConfigurationId) -> Result<RuntimeConfigurationRecord, RepositoryError> {
        self.configurations
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("configuration {}", id.0)))
    }

    async fn save(
        &self,
        record: RuntimeConfigurationRecord,
        _context: &PersistenceContext,
    ) -> Result<ConfigurationId, RepositoryError> {
        let id = record.id;
        self.configurations.lock().insert(id, record);
        Ok(id)
    }

    async fn delete(&self, id: ConfigurationId) -> Result<(), RepositoryError> {
        self.configurations.lock().remove(&id);
        Ok(())
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! What a skill can see of its surroundings.
//!
//! Roles and skills never hold references to the container runtime. Each
//! handler invocation receives a [`SkillContext`] carrying the owning role and
//! the container's [`ContainerServices`]; nodes are resolved by id through the
//! runtime configuration arena.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::conversation::{ConversationKey, ConversationStore};
use crate::domain::crypto::{CertificateDirectory, CryptoProvider};
use crate::domain::events::{RuntimeEvent, RuntimeEventSink};
use crate::domain::message::{Message, MessageBuilder};
use crate::domain::node::Node;
use crate::domain::qualified_name::QualifiedName;
use crate::domain::reply_timeouts::{RecoveryAction, ReplyTimeouts};
use crate::domain::role::{Role, RoleError};
use crate::domain::runtime_configuration::NodeRuntimeConfiguration;
use crate::domain::singleton_hosts::{SingletonAgentHosts, SingletonHostsError};
use crate::domain::skill::Skill;
use crate::domain::skill_factory::SkillFactory;
use crate::domain::transport::MessageTransport;

/// Container-wide collaborators, implemented by the node runtime.
pub trait ContainerServices: Send + Sync {
    fn container_name(&self) -> &str;

    /// True only in the container that founded the network.
    fn is_founding_container(&self) -> bool;

    fn singleton_hosts(&self) -> Result<Arc<SingletonAgentHosts>, SingletonHostsError>;

    fn configuration(&self) -> &NodeRuntimeConfiguration;

    fn skill_factory(&self) -> &SkillFactory;

    fn crypto(&self) -> &dyn CryptoProvider;

    fn certificates(&self) -> &dyn CertificateDirectory;

    fn transport(&self) -> &dyn MessageTransport;

    fn conversations(&self) -> &ConversationStore;

    fn reply_timeouts(&self) -> &ReplyTimeouts;

    fn events(&self) -> &dyn RuntimeEventSink;

    fn default_reply_timeout(&self) -> Duration;

    /// Whether fan-out to child roles runs on separate tasks.
    fn propagate_on_separate_tasks(&self) -> bool;
}

#[derive(Clone)]
pub struct SkillContext {
    role: Arc<Role>,
    services: Arc<dyn ContainerServices>,
}

impl SkillContext {
    pub fn new(role: Arc<Role>, services: Arc<dyn ContainerServices>) -> Self {
        Self { role, services }
    }

    pub fn role(&self) -> &Arc<Role> {
        &self.role
    }

    pub fn services(&self) -> &Arc<dyn ContainerServices> {
        &self.services
    }

    pub fn qualified_name(&self) -> &QualifiedName {
        self.role.qualified_name()
    }

    pub fn is_founding_container(&self) -> bool {
        self.services.is_founding_container()
    }

    /// The node owning this role.
    pub fn node(&self) -> Option<Arc<Node>> {
        self.role
            .node_id()
            .and_then(|id| self.services.configuration().node(&id))
    }

    /// Starts a message from this role.
    pub fn message_to(&self, recipient: QualifiedName, operation: &str) -> MessageBuilder {
        Message::builder(self.qualified_name().clone(), recipient, operation)
    }

    pub fn send(&self, message: Message) -> Result<(), RoleError> {
        self.role.send_message(self.services.as_ref(), message)
    }

    /// Sends `message` and expects an answer within `timeout`.
    pub fn send_expecting_reply(
        &self,
        message: Message,
        timeout: Duration,
        recoverable: bool,
        recovery: Option<RecoveryAction>,
    ) -> Result<(), RoleError> {
        self.services
            .reply_timeouts()
            .register(&message, timeout, recoverable, recovery);
        let reply_with = message.reply_with();
        self.send(message).inspect_err(|_| {
            self.services.reply_timeouts().cancel(reply_with);
        })
    }

    pub fn map_network_singleton(&self, name: &QualifiedName) -> Result<QualifiedName, SingletonHostsError> {
        Ok(self.services.singleton_hosts()?.map_network_singleton(name)?)
    }

    /// The parent role's live address, after singleton mapping.
    pub fn parent_qualified_name(&self) -> Result<Option<QualifiedName>, SingletonHostsError> {
        match self.role.parent_qualified_name()? {
            Some(parent) => self.map_network_singleton(&parent).map(Some),
            None => Ok(None),
        }
    }

    pub fn subskill(&self, class: &str) -> Result<Arc<dyn Skill>, RoleError> {
        self.role.find_or_create_subskill(class, self.services.skill_factory())
    }

    /// Conversation key scoped to this role and `skill`.
    pub fn conversation_key(&self, skill: &str, message: &Message) -> Option<ConversationKey> {
        self.role
            .node_id()
            .map(|node| ConversationKey::new(node, self.role.id(), skill, message.conversation_id()))
    }

    pub fn publish(&self, event: RuntimeEvent) {
        self.services.events().publish(event);
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Node Runtime
//!
//! One [`NodeRuntime`] per container. It owns the runtime configuration
//! (node arena and role indexes), the singleton hosting table, the
//! conversation store and the pending reply timeouts, and it is the
//! [`ContainerServices`] every skill sees through its context.
//!
//! Inbound flow:
//!
//! ```text
//! transport ──► NodeRuntime::dispatch
//!                 ├─ reply correlation (in_reply_to clears a pending timeout)
//!                 ├─ recipient lookup by qualified name
//!                 └─► Role::dispatch_message ──► Skill::receive_message
//! ```

use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::context::ContainerServices;
use crate::domain::conversation::ConversationStore;
use crate::domain::crypto::{CertificateDirectory, CredentialSource, CryptoProvider};
use crate::domain::events::{RuntimeEvent, RuntimeEventSink};
use crate::domain::message::{extend_trace, Message};
use crate::domain::node::{Node, NodeError};
use crate::domain::operations::{
    is_diagnostic_operation, parameters, INITIALIZE_TASK, MESSAGE_NOT_UNDERSTOOD_INFO,
};
use crate::domain::qualified_name::QualifiedName;
use crate::domain::reply_timeouts::ReplyTimeouts;
use crate::domain::role::{DispatchOutcome, Role, RoleError};
use crate::domain::runtime_configuration::{NodeRuntimeConfiguration, RuntimeConfigurationError};
use crate::domain::singleton_hosts::{SingletonAgentHosts, SingletonHostsError, SingletonHostsRegistry};
use crate::domain::skill::SkillState;
use crate::domain::skill_factory::SkillFactory;
use crate::domain::transport::MessageTransport;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("No role {0} in this container")]
    RoleNotFound(QualifiedName),

    #[error("Runtime of container {0} is shutting down")]
    ShuttingDown(String),

    #[error(transparent)]
    Role(#[from] RoleError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Configuration(#[from] RuntimeConfigurationError),

    #[error(transparent)]
    SingletonHosts(#[from] SingletonHostsError),
}

/// External collaborators shared by every container in a process.
#[derive(Clone)]
pub struct RuntimeCollaborators {
    pub skill_factory: Arc<SkillFactory>,
    pub crypto: Arc<dyn CryptoProvider>,
    pub certificates: Arc<dyn CertificateDirectory>,
    pub credentials: Arc<dyn CredentialSource>,
    pub transport: Arc<dyn MessageTransport>,
    pub events: Arc<dyn RuntimeEventSink>,
}

#[derive(Debug, Clone)]
pub struct MessagingSettings {
    pub reply_timeout: Duration,
    pub propagate_on_separate_tasks: bool,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(10),
            propagate_on_separate_tasks: true,
        }
    }
}

/// Skill states of one role, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleStatus {
    pub role: QualifiedName,
    pub skills: Vec<(String, SkillState)>,
}

pub struct NodeRuntime {
    container_name: String,
    founding: bool,
    settings: MessagingSettings,
    configuration: NodeRuntimeConfiguration,
    singleton_hosts: SingletonHostsRegistry,
    conversations: ConversationStore,
    reply_timeouts: ReplyTimeouts,
    collaborators: RuntimeCollaborators,
    this: Weak<NodeRuntime>,
}

impl NodeRuntime {
    pub fn new(
        container_name: impl Into<String>,
        founding: bool,
        settings: MessagingSettings,
        collaborators: RuntimeCollaborators,
    ) -> Arc<Self> {
        let container_name = container_name.into();
        Arc::new_cyclic(|this| Self {
            configuration: NodeRuntimeConfiguration::new(container_name.clone()),
            container_name,
            founding,
            settings,
            singleton_hosts: SingletonHostsRegistry::new(),
            conversations: ConversationStore::new(),
            reply_timeouts: ReplyTimeouts::new(collaborators.events.clone()),
            collaborators,
            this: this.clone(),
        })
    }

    /// Installs a new hosting table, replacing the previous one whole.
    pub fn load_singleton_hosts(&self, table: SingletonAgentHosts) {
        info!(
            container = %self.container_name,
            singletons = table.hosts().len(),
            "Singleton hosting table loaded"
        );
        self.singleton_hosts.replace(table);
    }

    pub fn add_node(&self, node: Arc<Node>) -> Result<(), RuntimeError> {
        self.configuration.add_node(node)?;
        Ok(())
    }

    pub fn services(&self) -> Result<Arc<dyn ContainerServices>, RuntimeError> {
        let this = self
            .this
            .upgrade()
            .ok_or_else(|| RuntimeError::ShuttingDown(self.container_name.clone()))?;
        Ok(this)
    }

    /// Hands an inbound message to its recipient role.
    pub async fn dispatch(&self, message: Message) -> Result<DispatchOutcome, RuntimeError> {
        let recipient = message.recipient_qualified_name().clone();
        let Some(role) = self.configuration.role_by_qualified_name(&recipient) else {
            warn!(container = %self.container_name, recipient = %recipient, "No local role for inbound message");
            self.collaborators.events.publish(RuntimeEvent::MessageUndeliverable {
                sender: message.sender_qualified_name().clone(),
                recipient: recipient.clone(),
                operation: message.operation().to_string(),
                reason: "no such role in container".to_string(),
                occurred_at: Utc::now(),
            });
            self.reply_role_not_found(&message);
            return Err(RuntimeError::RoleNotFound(recipient));
        };

        let services = self.services()?;
        Ok(role.dispatch_message(services, message).await?)
    }

    /// Answers a message for a role this container does not host.
    ///
    /// Only same-container senders get a reply: an answer to another
    /// container would have to be signed by the missing role. Diagnostics are
    /// never answered.
    fn reply_role_not_found(&self, message: &Message) {
        if message.crosses_containers() || is_diagnostic_operation(message.operation()) {
            return;
        }
        metrics::counter!("agora_messages_not_understood_total").increment(1);
        let hop = format!(
            "{} did not understand {} from {}: no such role",
            message.recipient_qualified_name(),
            message.operation(),
            message.sender_qualified_name()
        );
        let reply = Message::reply_to(message, MESSAGE_NOT_UNDERSTOOD_INFO)
            .parameter(parameters::TRACE, extend_trace(message.trace(), &hop))
            .parameter(parameters::MESSAGE, message.clone())
            .build();
        if let Err(e) = self.collaborators.transport.deliver(reply) {
            warn!(container = %self.container_name, error = %e, "Could not answer message for missing role");
        }
    }

    /// Synchronous request/response with a local skill.
    pub fn converse(&self, message: &Message) -> Result<Message, RuntimeError> {
        let recipient = message.recipient_qualified_name();
        let role = self
            .configuration
            .role_by_qualified_name(recipient)
            .ok_or_else(|| RuntimeError::RoleNotFound(recipient.clone()))?;
        Ok(role.converse_message(self.services()?, message)?)
    }

    /// Sends `message` on behalf of its local sender role.
    pub fn send(&self, message: Message) -> Result<(), RuntimeError> {
        let sender = message.sender_qualified_name();
        let role = self
            .configuration
            .role_by_qualified_name(sender)
            .ok_or_else(|| RuntimeError::RoleNotFound(sender.clone()))?;
        role.send_message(self, message)?;
        Ok(())
    }

    /// Sends `INITIALIZE_TASK` from every role to itself.
    pub fn initialize_roles(&self) -> Result<usize, RuntimeError> {
        let roles = self.configuration.roles();
        for role in &roles {
            let name = role.qualified_name().clone();
            debug!(role = %name, "Initializing role");
            role.send_message(self, Message::builder(name.clone(), name, INITIALIZE_TASK).build())?;
        }
        info!(container = %self.container_name, roles = roles.len(), founding = self.founding, "Roles initialized");
        Ok(roles.len())
    }

    pub fn role_statuses(&self) -> Vec<RoleStatus> {
        let mut statuses: Vec<RoleStatus> = self
            .configuration
            .roles()
            .into_iter()
            .map(|role| RoleStatus {
                role: role.qualified_name().clone(),
                skills: role
                    .skills()
                    .iter()
                    .map(|skill| (skill.class_name().to_string(), skill.state()))
                    .collect(),
            })
            .collect();
        statuses.sort_by(|a, b| a.role.cmp(&b.role));
        statuses
    }

    pub fn skill_state(&self, role: &QualifiedName, skill: &str) -> Option<SkillState> {
        self.configuration
            .role_by_qualified_name(role)
            .and_then(|role| role.skill(skill))
            .map(|skill| skill.state())
    }

    pub fn role(&self, name: &QualifiedName) -> Option<Arc<Role>> {
        self.configuration.role_by_qualified_name(name)
    }

    pub fn local_roles(&self) -> Vec<QualifiedName> {
        self.configuration
            .roles()
            .iter()
            .map(|role| role.qualified_name().clone())
            .collect()
    }
}

impl ContainerServices for NodeRuntime {
    fn container_name(&self) -> &str {
        &self.container_name
    }

    fn is_founding_container(&self) -> bool {
        self.founding
    }

    fn singleton_hosts(&self) -> Result<Arc<SingletonAgentHosts>, SingletonHostsError> {
        self.singleton_hosts.current()
    }

    fn configuration(&self) -> &NodeRuntimeConfiguration {
        &self.configuration
    }

    fn skill_factory(&self) -> &SkillFactory {
        &self.collaborators.skill_factory
    }

    fn crypto(&self) -> &dyn CryptoProvider {
        self.collaborators.crypto.as_ref()
    }

    fn certificates(&self) -> &dyn CertificateDirectory {
        self.collaborators.certificates.as_ref()
    }

    fn transport(&self) -> &dyn MessageTransport {
        self.collaborators.transport.as_ref()
    }

    fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    fn reply_timeouts(&self) -> &ReplyTimeouts {
        &self.reply_timeouts
    }

    fn events(&self) -> &dyn RuntimeEventSink {
        self.collaborators.events.as_ref()
    }

    fn default_reply_timeout(&self) -> Duration {
        self.settings.reply_timeout
    }

    fn propagate_on_separate_tasks(&self) -> bool {
        self.settings.propagate_on_separate_tasks
    }
}

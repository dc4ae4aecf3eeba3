// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Roles
//!
//! A [`Role`] is the addressable actor of the network. It owns the skills
//! instantiated from its definition, the subskills its skills share, and, when
//! remote communication is permitted, the credential it signs with.
//!
//! ## Inbound dispatch
//!
//! [`Role::dispatch_message`] routes one inbound message:
//!
//! 1. `MESSAGE_NOT_UNDERSTOOD_INFO` is logged and dropped, so diagnostics never loop.
//! 2. A role without a node is not dispatch-ready.
//! 3. A cross-container message must be signed by its sender and verify. Only a
//!    message past this check may clear the reply timeout it answers.
//! 4. A named recipient service selects that skill (or subskill); otherwise every
//!    skill understanding the operation receives it.
//! 5. Each selected skill's permission check and lifecycle gate run before its handler.
//!
//! A message nobody understands is answered with exactly one
//! `MESSAGE_NOT_UNDERSTOOD_INFO`; a message every selected skill rejected is
//! answered with exactly one `OPERATION_NOT_PERMITTED_INFO`.
//!
//! ## Outbound send
//!
//! [`Role::send_message`] checks the sender, rewrites singleton recipients to
//! their live host, signs when the message leaves the container and hands it
//! to the transport.
//!
//! ## Locking
//!
//! The skill map, the subskill index, the node back-reference and the
//! credential each sit behind their own lock. None is held across an await.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::context::{ContainerServices, SkillContext};
use crate::domain::crypto::{CryptoError, RoleCredential};
use crate::domain::events::RuntimeEvent;
use crate::domain::message::{extend_trace, Message, MessageError};
use crate::domain::node::NodeId;
use crate::domain::operations::{
    is_diagnostic_operation, parameters, MESSAGE_NOT_UNDERSTOOD_INFO, OPERATION_NOT_PERMITTED_INFO,
};
use crate::domain::qualified_name::{AgentRoleName, QualifiedName, QualifiedNameError};
use crate::domain::singleton_hosts::SingletonHostsError;
use crate::domain::skill::{Skill, SkillError, Transition};
use crate::domain::skill_factory::SkillFactory;
use crate::domain::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub Uuid);

impl RoleId {
    /// Stable id for a fully qualified role.
    pub fn derive(name: &QualifiedName) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("role:{}", name).as_bytes()))
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error)]
pub enum RoleError {
    #[error("Role {role} is not the sender of a message from {sender}")]
    NotSenderRole { role: QualifiedName, sender: QualifiedName },

    #[error("Message for {recipient} was dispatched to {role}")]
    WrongRecipient { role: QualifiedName, recipient: QualifiedName },

    #[error("Role {0} has no node and cannot dispatch")]
    NotDispatchReady(QualifiedName),

    #[error("Role {0} is remote-capable but holds no signing credential")]
    MissingCredential(QualifiedName),

    #[error("Role {0} does not permit remote communications")]
    RemoteCommunicationsNotPermitted(QualifiedName),

    #[error("Credential for {credential} cannot be installed in role {role}")]
    CredentialMismatch { role: QualifiedName, credential: QualifiedName },

    #[error("Skill class {class} is not declared by role {role}")]
    UndeclaredSkill { role: QualifiedName, class: String },

    #[error("Skill class {class} is already installed in role {role}")]
    DuplicateSkill { role: QualifiedName, class: String },

    #[error("Unknown skill class {0}")]
    UnknownSkillClass(String),

    #[error("Role {role} has no skill or subskill {class}")]
    SkillNotFound { role: QualifiedName, class: String },

    #[error("Role {0} is already bound to a node")]
    AlreadyBound(QualifiedName),

    #[error(transparent)]
    Skill(#[from] SkillError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    SingletonHosts(#[from] SingletonHostsError),

    #[error(transparent)]
    QualifiedName(#[from] QualifiedNameError),
}

/// Persistent, container-independent description of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Role segment of the qualified name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<AgentRoleName>,
    #[serde(default)]
    pub children: BTreeSet<AgentRoleName>,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default)]
    pub state_variables: BTreeSet<String>,
    #[serde(default)]
    pub remote_communications_permitted: bool,
}

impl RoleDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parent: None,
            children: BTreeSet::new(),
            skills: BTreeSet::new(),
            state_variables: BTreeSet::new(),
            remote_communications_permitted: false,
        }
    }
}

/// Result of one inbound dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { skills: Vec<String> },
    NotUnderstood,
    NotPermitted { reason: String },
    Ignored,
}

pub struct Role {
    id: RoleId,
    qualified_name: QualifiedName,
    definition: RoleDefinition,
    node_id: RwLock<Option<NodeId>>,
    skills: RwLock<BTreeMap<String, Arc<dyn Skill>>>,
    subskills: Mutex<HashMap<String, Arc<OnceLock<Arc<dyn Skill>>>>>,
    credential: RwLock<Option<RoleCredential>>,
}

impl Role {
    pub fn new(container: &str, agent: &str, definition: RoleDefinition) -> Result<Self, RoleError> {
        let qualified_name = QualifiedName::new(container, agent, &definition.name)?;
        Ok(Self {
            id: RoleId::derive(&qualified_name),
            qualified_name,
            definition,
            node_id: RwLock::new(None),
            skills: RwLock::new(BTreeMap::new()),
            subskills: Mutex::new(HashMap::new()),
            credential: RwLock::new(None),
        })
    }

    pub fn id(&self) -> RoleId {
        self.id
    }

    pub fn qualified_name(&self) -> &QualifiedName {
        &self.qualified_name
    }

    pub fn definition(&self) -> &RoleDefinition {
        &self.definition
    }

    pub fn are_remote_communications_permitted(&self) -> bool {
        self.definition.remote_communications_permitted
    }

    pub fn node_id(&self) -> Option<NodeId> {
        *self.node_id.read()
    }

    pub(crate) fn bind_node(&self, node: NodeId) -> Result<(), RoleError> {
        let mut slot = self.node_id.write();
        match *slot {
            Some(existing) if existing != node => Err(RoleError::AlreadyBound(self.qualified_name.clone())),
            _ => {
                *slot = Some(node);
                Ok(())
            }
        }
    }

    /// Parent address within this role's container, before singleton mapping.
    pub fn parent_qualified_name(&self) -> Result<Option<QualifiedName>, QualifiedNameError> {
        self.definition
            .parent
            .as_ref()
            .map(|parent| QualifiedName::with_container_of(self.qualified_name.container_name(), parent))
            .transpose()
    }

    /// Child addresses within this role's container, in definition order.
    pub fn child_qualified_names(&self) -> Result<Vec<QualifiedName>, QualifiedNameError> {
        self.definition
            .children
            .iter()
            .map(|child| QualifiedName::with_container_of(self.qualified_name.container_name(), child))
            .collect()
    }

    pub fn is_child(&self, agent_role: &AgentRoleName) -> bool {
        self.definition.children.contains(agent_role)
    }

    // --- credentials ---

    pub fn install_credential(&self, credential: RoleCredential) -> Result<(), RoleError> {
        if !self.definition.remote_communications_permitted {
            return Err(RoleError::RemoteCommunicationsNotPermitted(self.qualified_name.clone()));
        }
        if credential.certificate().subject != self.qualified_name {
            return Err(RoleError::CredentialMismatch {
                role: self.qualified_name.clone(),
                credential: credential.certificate().subject.clone(),
            });
        }
        *self.credential.write() = Some(credential);
        Ok(())
    }

    pub fn credential(&self) -> Option<RoleCredential> {
        self.credential.read().clone()
    }

    // --- skills ---

    pub fn install_skill(&self, skill: Arc<dyn Skill>) -> Result<(), RoleError> {
        let class = skill.class_name().to_string();
        if !self.definition.skills.contains(&class) {
            return Err(RoleError::UndeclaredSkill {
                role: self.qualified_name.clone(),
                class,
            });
        }
        let mut skills = self.skills.write();
        if skills.contains_key(&class) {
            return Err(RoleError::DuplicateSkill {
                role: self.qualified_name.clone(),
                class,
            });
        }
        skills.insert(class, skill);
        Ok(())
    }

    /// Instantiates every declared skill class not yet installed.
    pub fn install_declared_skills(&self, factory: &SkillFactory) -> Result<usize, RoleError> {
        let mut installed = 0;
        for class in &self.definition.skills {
            if self.skills.read().contains_key(class) {
                continue;
            }
            let skill = factory
                .create(class)
                .ok_or_else(|| RoleError::UnknownSkillClass(class.clone()))?;
            self.install_skill(skill)?;
            installed += 1;
        }
        Ok(installed)
    }

    pub fn skill(&self, class: &str) -> Option<Arc<dyn Skill>> {
        self.skills.read().get(class).cloned()
    }

    pub fn skills(&self) -> Vec<Arc<dyn Skill>> {
        self.skills.read().values().cloned().collect()
    }

    pub fn subskill(&self, class: &str) -> Option<Arc<dyn Skill>> {
        self.subskills
            .lock()
            .get(class)
            .and_then(|cell| cell.get().cloned())
    }

    /// Returns the role's single instance of subskill `class`, creating it on first use.
    ///
    /// Concurrent first uses construct exactly one instance; the others block
    /// until it is available and observe the same `Arc`.
    pub fn find_or_create_subskill(&self, class: &str, factory: &SkillFactory) -> Result<Arc<dyn Skill>, RoleError> {
        let cell = {
            let mut subskills = self.subskills.lock();
            if let Some(skill) = subskills.get(class).and_then(|cell| cell.get()) {
                return Ok(skill.clone());
            }
            subskills
                .entry(class.to_string())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone()
        };

        if let Some(skill) = cell.get() {
            return Ok(skill.clone());
        }
        let constructor = factory
            .constructor(class)
            .ok_or_else(|| RoleError::UnknownSkillClass(class.to_string()))?;
        Ok(cell
            .get_or_init(|| {
                debug!(role = %self.qualified_name, subskill = %class, "Subskill instantiated");
                constructor()
            })
            .clone())
    }

    fn skill_or_subskill(&self, class: &str) -> Option<Arc<dyn Skill>> {
        self.skill(class).or_else(|| self.subskill(class))
    }

    // --- inbound ---

    /// Routes one inbound message to this role's skills.
    pub async fn dispatch_message(
        self: &Arc<Self>,
        services: Arc<dyn ContainerServices>,
        message: Message,
    ) -> Result<DispatchOutcome, RoleError> {
        let operation = message.operation().to_string();

        if operation == MESSAGE_NOT_UNDERSTOOD_INFO {
            info!(
                role = %self.qualified_name,
                sender = %message.sender_qualified_name(),
                trace = message.trace().unwrap_or_default(),
                "Peer did not understand a message"
            );
            return Ok(DispatchOutcome::Ignored);
        }
        if message.recipient_qualified_name() != &self.qualified_name {
            return Err(RoleError::WrongRecipient {
                role: self.qualified_name.clone(),
                recipient: message.recipient_qualified_name().clone(),
            });
        }
        if self.node_id().is_none() {
            return Err(RoleError::NotDispatchReady(self.qualified_name.clone()));
        }

        debug!(role = %self.qualified_name, message = %message, "Dispatching message");
        let context = SkillContext::new(self.clone(), services.clone());

        if let Err(reason) = self.authorize_inbound(services.as_ref(), &message) {
            return self.reply_not_permitted(services.as_ref(), &message, reason);
        }
        services.reply_timeouts().observe_reply(&message);

        let targets: Vec<Arc<dyn Skill>> = match message.recipient_service() {
            Some(service) => self.skill_or_subskill(service).into_iter().collect(),
            None => self
                .skills
                .read()
                .values()
                .filter(|skill| skill.understands(&operation))
                .cloned()
                .collect(),
        };

        if targets.is_empty() {
            return self.reply_not_understood(services.as_ref(), &message);
        }

        let founding = services.is_founding_container();
        let mut delivered = Vec::with_capacity(targets.len());
        let mut rejections = Vec::new();

        for skill in targets {
            let class = skill.class_name().to_string();

            if !skill.is_operation_permitted(&context, &message) {
                rejections.push(format!(
                    "{} does not permit {} from {}",
                    class,
                    operation,
                    message.sender_qualified_name()
                ));
                continue;
            }

            match skill
                .lifecycle()
                .admit(&class, &operation, founding, skill.join_acknowledged_policy())
            {
                Ok(Transition::Changed { from, to }) => {
                    info!(
                        role = %self.qualified_name,
                        skill = %class,
                        operation = %operation,
                        "Skill state {} -> {}", from, to
                    );
                    context.publish(RuntimeEvent::SkillStateChanged {
                        role: self.qualified_name.clone(),
                        skill: class.clone(),
                        from,
                        to,
                        changed_at: Utc::now(),
                    });
                }
                Ok(Transition::Unchanged(_)) => {}
                Err(err) => {
                    metrics::counter!("agora_protocol_violations_total").increment(1);
                    warn!(role = %self.qualified_name, skill = %class, error = %err, "Protocol violation");
                    if let SkillError::InvalidStateTransition { state, .. } = &err {
                        context.publish(RuntimeEvent::ProtocolViolation {
                            role: self.qualified_name.clone(),
                            skill: class.clone(),
                            operation: operation.clone(),
                            state: *state,
                            occurred_at: Utc::now(),
                        });
                    }
                    rejections.push(err.to_string());
                    continue;
                }
            }

            if let Err(err) = skill.receive_message(&context, &message).await {
                warn!(
                    role = %self.qualified_name,
                    skill = %class,
                    operation = %operation,
                    error = %err,
                    "Skill failed to handle message"
                );
            }
            delivered.push(class);
        }

        if delivered.is_empty() {
            return self.reply_not_permitted(services.as_ref(), &message, rejections.join("; "));
        }

        metrics::counter!("agora_messages_dispatched_total").increment(1);
        context.publish(RuntimeEvent::MessageDelivered {
            role: self.qualified_name.clone(),
            operation,
            skills: delivered.clone(),
            delivered_at: Utc::now(),
        });
        Ok(DispatchOutcome::Delivered { skills: delivered })
    }

    /// Synchronous request/response with the skill named by `recipient_service`.
    pub fn converse_message(
        self: &Arc<Self>,
        services: Arc<dyn ContainerServices>,
        message: &Message,
    ) -> Result<Message, RoleError> {
        if self.node_id().is_none() {
            return Err(RoleError::NotDispatchReady(self.qualified_name.clone()));
        }
        let class = message.recipient_service().unwrap_or_default();
        let skill = self
            .skill_or_subskill(class)
            .ok_or_else(|| RoleError::SkillNotFound {
                role: self.qualified_name.clone(),
                class: class.to_string(),
            })?;

        let context = SkillContext::new(self.clone(), services.clone());
        if !skill.is_operation_permitted(&context, message) {
            return Err(SkillError::NotPermitted {
                operation: message.operation().to_string(),
                sender: message.sender_qualified_name().to_string(),
            }
            .into());
        }
        skill.lifecycle().admit(
            skill.class_name(),
            message.operation(),
            services.is_founding_container(),
            skill.join_acknowledged_policy(),
        )?;
        Ok(skill.converse_message(&context, message)?)
    }

    fn authorize_inbound(&self, services: &dyn ContainerServices, message: &Message) -> Result<(), String> {
        if !message.crosses_containers() {
            return Ok(());
        }
        if !self.definition.remote_communications_permitted {
            return Err(format!(
                "{} does not accept messages from other containers",
                self.qualified_name
            ));
        }

        let sender = message.sender_qualified_name();
        let signature = message
            .signature()
            .ok_or_else(|| format!("message from {} is not signed", sender))?;
        let certificate = services
            .certificates()
            .certificate_for(sender)
            .or_else(|| {
                message
                    .certificate_parameter()
                    .filter(|certificate| &certificate.subject == sender)
                    .cloned()
            })
            .ok_or_else(|| format!("no certificate known for {}", sender))?;
        let bytes = message.signable_bytes().map_err(|e| e.to_string())?;

        services
            .crypto()
            .verify(&bytes, signature, &certificate)
            .map_err(|e| e.to_string())
    }

    fn reply_not_understood(
        &self,
        services: &dyn ContainerServices,
        message: &Message,
    ) -> Result<DispatchOutcome, RoleError> {
        metrics::counter!("agora_messages_not_understood_total").increment(1);
        warn!(
            role = %self.qualified_name,
            operation = %message.operation(),
            service = message.recipient_service().unwrap_or_default(),
            sender = %message.sender_qualified_name(),
            "Message not understood"
        );
        services.events().publish(RuntimeEvent::MessageNotUnderstood {
            role: self.qualified_name.clone(),
            operation: message.operation().to_string(),
            sender: message.sender_qualified_name().clone(),
            occurred_at: Utc::now(),
        });

        let hop = format!(
            "{} did not understand {} from {}",
            self.qualified_name,
            message.operation(),
            message.sender_qualified_name()
        );
        let reply = Message::reply_to(message, MESSAGE_NOT_UNDERSTOOD_INFO)
            .parameter(parameters::TRACE, extend_trace(message.trace(), &hop))
            .parameter(parameters::MESSAGE, message.clone())
            .build();
        self.send_message(services, reply)?;
        Ok(DispatchOutcome::NotUnderstood)
    }

    fn reply_not_permitted(
        &self,
        services: &dyn ContainerServices,
        message: &Message,
        reason: String,
    ) -> Result<DispatchOutcome, RoleError> {
        if is_diagnostic_operation(message.operation()) {
            warn!(
                role = %self.qualified_name,
                operation = %message.operation(),
                sender = %message.sender_qualified_name(),
                reason = %reason,
                "Dropping rejected diagnostic"
            );
            return Ok(DispatchOutcome::Ignored);
        }

        metrics::counter!("agora_messages_not_permitted_total").increment(1);
        warn!(
            role = %self.qualified_name,
            operation = %message.operation(),
            sender = %message.sender_qualified_name(),
            reason = %reason,
            "Operation not permitted"
        );
        services.events().publish(RuntimeEvent::OperationNotPermitted {
            role: self.qualified_name.clone(),
            operation: message.operation().to_string(),
            sender: message.sender_qualified_name().clone(),
            reason: reason.clone(),
            occurred_at: Utc::now(),
        });

        let reply = Message::reply_to(message, OPERATION_NOT_PERMITTED_INFO)
            .parameter(parameters::REASON, reason.clone())
            .parameter(parameters::MESSAGE, message.clone())
            .build();
        self.send_message(services, reply)?;
        Ok(DispatchOutcome::NotPermitted { reason })
    }

    // --- outbound ---

    /// Sends a message built by this role.
    pub fn send_message(&self, services: &dyn ContainerServices, message: Message) -> Result<(), RoleError> {
        if message.sender_qualified_name() != &self.qualified_name {
            return Err(RoleError::NotSenderRole {
                role: self.qualified_name.clone(),
                sender: message.sender_qualified_name().clone(),
            });
        }

        let recipient = services
            .singleton_hosts()?
            .map_network_singleton(message.recipient_qualified_name())?;
        let message = if &recipient != message.recipient_qualified_name() {
            debug!(
                from = %message.recipient_qualified_name(),
                to = %recipient,
                "Recipient mapped to network singleton host"
            );
            message.readdressed(recipient)?
        } else {
            message
        };

        let message = if self.definition.remote_communications_permitted && message.crosses_containers() {
            let credential = self
                .credential()
                .ok_or_else(|| RoleError::MissingCredential(self.qualified_name.clone()))?;
            let signature = services.crypto().sign(&message.signable_bytes()?, &credential)?;
            metrics::counter!("agora_messages_signed_total").increment(1);
            message.with_signature(signature)?
        } else {
            message
        };

        debug!(role = %self.qualified_name, message = %message, signed = message.is_signed(), "Sending message");

        let sender = message.sender_qualified_name().clone();
        let recipient = message.recipient_qualified_name().clone();
        let operation = message.operation().to_string();
        services.transport().deliver(message).map_err(|err| {
            warn!(role = %self.qualified_name, recipient = %recipient, error = %err, "Message undeliverable");
            services.events().publish(RuntimeEvent::MessageUndeliverable {
                sender,
                recipient,
                operation,
                reason: err.to_string(),
                occurred_at: Utc::now(),
            });
            RoleError::from(err)
        })
    }

    /// Sends `operation` to every child role hosted in this container.
    ///
    /// With `separate_tasks`, each send runs on its own task so that one child
    /// cannot hold up the others.
    pub fn propagate_operation_to_children(
        self: &Arc<Self>,
        services: Arc<dyn ContainerServices>,
        operation: &str,
        separate_tasks: bool,
    ) -> Result<usize, RoleError> {
        let mut sent = 0;
        for child in self.child_qualified_names()? {
            if services.configuration().role_by_qualified_name(&child).is_none() {
                debug!(role = %self.qualified_name, child = %child, "Child not hosted here; skipping");
                continue;
            }
            let message = Message::builder(self.qualified_name.clone(), child, operation).build();
            if separate_tasks {
                let role = self.clone();
                let services = services.clone();
                tokio::spawn(async move {
                    if let Err(err) = role.send_message(services.as_ref(), message) {
                        warn!(role = %role.qualified_name, error = %err, "Propagation to child failed");
                    }
                });
            } else {
                self.send_message(services.as_ref(), message)?;
            }
            sent += 1;
        }
        Ok(sent)
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Role")
            .field("id", &self.id)
            .field("qualified_name", &self.qualified_name)
            .field("node_id", &self.node_id())
            .field("skills", &self.skills.read().keys().collect::<Vec<_>>())
            .field("remote", &self.definition.remote_communications_permitted)
            .finish()
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Network singleton host skill.
//!
//! Installed on the role that is the network-wide authority for its agent
//! name. A child role elsewhere on the network attaches beneath it with:
//!
//! ```text
//! child                                   singleton host
//!   │ JOIN_NETWORK_SINGLETON_AGENT_INFO ──►  (READY, child declared?)
//!   │                                        record certificate
//!   │ ◄── JOIN_ACKNOWLEDGED_TASK + certificate
//!   │ ◄── DELEGATE_PERFORM_MISSION_TASK (container = child's)
//! ```
//!
//! Joins are accepted only from roles declared among this role's children.

use agora_core::domain::context::SkillContext;
use agora_core::domain::events::RuntimeEvent;
use agora_core::domain::message::Message;
use agora_core::domain::operations::{
    parameters, DELEGATE_PERFORM_MISSION_TASK, INITIALIZE_TASK, JOIN_ACKNOWLEDGED_TASK,
    JOIN_NETWORK_SINGLETON_AGENT_INFO, PERFORM_MISSION_TASK, SHUTDOWN_AGENT_TASK, TASK_ACCOMPLISHED_INFO,
};
use agora_core::domain::skill::{JoinAcknowledgedPolicy, Skill, SkillError, SkillLifecycle};
use async_trait::async_trait;
use chrono::Utc;
use std::any::Any;
use tracing::{debug, info};

use crate::domain::peer_credentials::{peer_credentials, PeerCredentials, PeerRelation};

pub const NETWORK_SINGLETON_SKILL: &str = "NetworkSingletonSkill";

#[derive(Default)]
pub struct NetworkSingletonSkill {
    lifecycle: SkillLifecycle,
}

impl NetworkSingletonSkill {
    pub fn new() -> Self {
        Self::default()
    }

    fn accept_join(&self, context: &SkillContext, message: &Message) -> Result<(), SkillError> {
        let child = message.sender_qualified_name();
        let certificate = message
            .certificate_parameter()
            .filter(|certificate| &certificate.subject == child)
            .cloned()
            .ok_or_else(|| SkillError::MissingParameter(parameters::CERTIFICATE.to_string()))?;
        let own = context
            .role()
            .credential()
            .ok_or_else(|| SkillError::Failed(format!("{} has no credential to present", context.qualified_name())))?;

        let peers = PeerCredentials::of(context)?;
        let first_join = peer_credentials(&peers)?.record(certificate, PeerRelation::Child);

        if let Some(key) = context.conversation_key(NETWORK_SINGLETON_SKILL, message) {
            let conversations = context.services().conversations();
            conversations.begin(key.clone());
            conversations.record(&key, "child", serde_json::json!(child.as_str()));
        }

        metrics::counter!("agora_network_joins_total").increment(1);
        info!(
            role = %context.qualified_name(),
            child = %child,
            first_join,
            "Child joined network singleton"
        );
        context.publish(RuntimeEvent::RoleJoined {
            parent: context.qualified_name().clone(),
            child: child.clone(),
            joined_at: Utc::now(),
        });

        let acknowledgement = Message::reply_to(message, JOIN_ACKNOWLEDGED_TASK)
            .parameter(parameters::CERTIFICATE, own.certificate().clone())
            .build();
        context.send(acknowledgement)?;

        let delegation = context
            .message_to(child.clone(), DELEGATE_PERFORM_MISSION_TASK)
            .conversation_id(message.conversation_id())
            .sender_service(NETWORK_SINGLETON_SKILL)
            .maybe_recipient_service(message.sender_service().map(str::to_string))
            .parameter(parameters::CONTAINER, child.container_name())
            .parameter(parameters::CERTIFICATE, own.certificate().clone())
            .build();
        context.send(delegation)?;
        Ok(())
    }
}

#[async_trait]
impl Skill for NetworkSingletonSkill {
    fn class_name(&self) -> &str {
        NETWORK_SINGLETON_SKILL
    }

    fn understood_operations(&self) -> &[&'static str] {
        &[
            INITIALIZE_TASK,
            JOIN_NETWORK_SINGLETON_AGENT_INFO,
            JOIN_ACKNOWLEDGED_TASK,
            PERFORM_MISSION_TASK,
            TASK_ACCOMPLISHED_INFO,
            SHUTDOWN_AGENT_TASK,
        ]
    }

    fn lifecycle(&self) -> &SkillLifecycle {
        &self.lifecycle
    }

    fn join_acknowledged_policy(&self) -> JoinAcknowledgedPolicy {
        JoinAcknowledgedPolicy::Tolerate
    }

    fn is_operation_permitted(&self, context: &SkillContext, message: &Message) -> bool {
        match message.operation() {
            JOIN_NETWORK_SINGLETON_AGENT_INFO => context
                .role()
                .is_child(&message.sender_qualified_name().agent_role_name()),
            _ => true,
        }
    }

    async fn receive_message(&self, context: &SkillContext, message: &Message) -> Result<(), SkillError> {
        match message.operation() {
            INITIALIZE_TASK => {
                info!(
                    role = %context.qualified_name(),
                    state = %self.lifecycle.state(),
                    "Network singleton initialized"
                );
                Ok(())
            }
            JOIN_NETWORK_SINGLETON_AGENT_INFO => self.accept_join(context, message),
            JOIN_ACKNOWLEDGED_TASK => {
                debug!(role = %context.qualified_name(), sender = %message.sender_qualified_name(), "Ignoring join acknowledgement");
                Ok(())
            }
            PERFORM_MISSION_TASK | SHUTDOWN_AGENT_TASK => {
                let sent = context.role().propagate_operation_to_children(
                    context.services().clone(),
                    message.operation(),
                    context.services().propagate_on_separate_tasks(),
                )?;
                debug!(role = %context.qualified_name(), operation = %message.operation(), children = sent, "Propagated to children");
                Ok(())
            }
            TASK_ACCOMPLISHED_INFO => {
                info!(
                    role = %context.qualified_name(),
                    sender = %message.sender_qualified_name(),
                    trace = message.trace().unwrap_or_default(),
                    "Child reported task accomplished"
                );
                if let Some(key) = context.conversation_key(NETWORK_SINGLETON_SKILL, message) {
                    context.services().conversations().conclude(&key);
                }
                Ok(())
            }
            other => Err(SkillError::OperationNotSupported {
                skill: NETWORK_SINGLETON_SKILL.to_string(),
                operation: other.to_string(),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

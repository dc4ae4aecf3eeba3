// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Joining side of the network singleton protocol.
//!
//! On `INITIALIZE_TASK` in a non-founding container, a role whose parent is a
//! network singleton hosted in another container sends the join request and
//! waits for the acknowledgement under a reply timeout. The acknowledgement
//! leaves the skill isolated. The host's `DELEGATE_PERFORM_MISSION_TASK` is
//! scoped to this container: every role here that is still isolated gets a
//! `PERFORM_MISSION_TASK` addressed to itself, and the host is told with
//! `TASK_ACCOMPLISHED_INFO` so it can close the join conversation.

use agora_core::domain::context::SkillContext;
use agora_core::domain::message::Message;
use agora_core::domain::operations::{
    parameters, DELEGATE_PERFORM_MISSION_TASK, INITIALIZE_TASK, JOIN_ACKNOWLEDGED_TASK,
    JOIN_NETWORK_SINGLETON_AGENT_INFO, PERFORM_MISSION_TASK, SHUTDOWN_AGENT_TASK, TASK_ACCOMPLISHED_INFO,
};
use agora_core::domain::qualified_name::QualifiedName;
use agora_core::domain::role::RoleError;
use agora_core::domain::skill::{JoinAcknowledgedPolicy, Skill, SkillError, SkillLifecycle, SkillState};
use async_trait::async_trait;
use std::any::Any;
use tracing::{debug, info, warn};

use crate::application::network_singleton::NETWORK_SINGLETON_SKILL;
use crate::domain::peer_credentials::{peer_credentials, PeerCredentials, PeerRelation};

pub const NETWORK_JOIN_SKILL: &str = "NetworkJoinSkill";

#[derive(Default)]
pub struct NetworkJoinSkill {
    lifecycle: SkillLifecycle,
}

impl NetworkJoinSkill {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parent to join, if it is a singleton hosted in another container.
    fn singleton_parent(&self, context: &SkillContext) -> Result<Option<QualifiedName>, SkillError> {
        let Some(parent) = context.parent_qualified_name().map_err(RoleError::from)? else {
            return Ok(None);
        };
        let hosts = context.services().singleton_hosts().map_err(RoleError::from)?;
        if !hosts.is_network_singleton(parent.agent_name()) || parent.is_same_container(context.qualified_name()) {
            return Ok(None);
        }
        Ok(Some(parent))
    }

    fn request_join(&self, context: &SkillContext) -> Result<(), SkillError> {
        if context.is_founding_container() {
            debug!(role = %context.qualified_name(), "Founding container; no join needed");
            return Ok(());
        }
        let Some(parent) = self.singleton_parent(context)? else {
            debug!(role = %context.qualified_name(), "Parent is not a remote network singleton; no join needed");
            return Ok(());
        };

        let credential = context.role().credential().ok_or_else(|| {
            SkillError::Failed(format!(
                "{} must permit remote communications to join {}",
                context.qualified_name(),
                parent
            ))
        })?;

        let join = context
            .message_to(parent.clone(), JOIN_NETWORK_SINGLETON_AGENT_INFO)
            .sender_service(NETWORK_JOIN_SKILL)
            .recipient_service(NETWORK_SINGLETON_SKILL)
            .parameter(parameters::CERTIFICATE, credential.certificate().clone())
            .build();

        if let Some(key) = context.conversation_key(NETWORK_JOIN_SKILL, &join) {
            let conversations = context.services().conversations();
            conversations.begin(key.clone());
            conversations.record(&key, "parent", serde_json::json!(parent.as_str()));
        }

        info!(role = %context.qualified_name(), parent = %parent, "Requesting to join network singleton");
        context.send_expecting_reply(join, context.services().default_reply_timeout(), false, None)?;
        Ok(())
    }

    fn acknowledged(&self, context: &SkillContext, message: &Message) -> Result<(), SkillError> {
        let parent = message.sender_qualified_name();
        match message.certificate_parameter().filter(|c| &c.subject == parent) {
            Some(certificate) => {
                let peers = PeerCredentials::of(context)?;
                peer_credentials(&peers)?.record(certificate.clone(), PeerRelation::Parent);
            }
            None => warn!(role = %context.qualified_name(), parent = %parent, "Join acknowledged without a certificate"),
        }

        if let Some(key) = context.conversation_key(NETWORK_JOIN_SKILL, message) {
            context
                .services()
                .conversations()
                .record(&key, "acknowledged", serde_json::json!(true));
        }
        info!(
            role = %context.qualified_name(),
            parent = %parent,
            state = %self.lifecycle.state(),
            "Joined network singleton; awaiting mission"
        );
        Ok(())
    }

    fn delegated(&self, context: &SkillContext, message: &Message) -> Result<(), SkillError> {
        let container = message
            .text_parameter(parameters::CONTAINER)
            .ok_or_else(|| SkillError::MissingParameter(parameters::CONTAINER.to_string()))?;
        if container != context.services().container_name() {
            warn!(
                role = %context.qualified_name(),
                container = %container,
                "Mission delegated to another container; ignoring"
            );
            return Ok(());
        }

        if let Some(key) = context.conversation_key(NETWORK_JOIN_SKILL, message) {
            context.services().conversations().conclude(&key);
        }

        let started = self.start_container_mission(context)?;
        info!(
            role = %context.qualified_name(),
            container = %container,
            roles = started,
            "Mission delegated to this container"
        );

        let report = Message::reply_to(message, TASK_ACCOMPLISHED_INFO)
            .parameter(
                parameters::TRACE,
                format!("{} joined and started {} roles", context.qualified_name(), started),
            )
            .build();
        context.send(report)?;
        Ok(())
    }

    /// Sends `PERFORM_MISSION_TASK` from every still isolated role of this
    /// container to itself, this role included.
    fn start_container_mission(&self, context: &SkillContext) -> Result<usize, SkillError> {
        let services = context.services();
        let mut started = 0;
        for role in services.configuration().roles() {
            let isolated = role
                .skills()
                .iter()
                .any(|skill| skill.state() == SkillState::IsolatedFromNetwork);
            if !isolated {
                continue;
            }
            let name = role.qualified_name().clone();
            role.send_message(
                services.as_ref(),
                Message::builder(name.clone(), name, PERFORM_MISSION_TASK).build(),
            )?;
            started += 1;
        }
        Ok(started)
    }

    fn propagate(&self, context: &SkillContext, operation: &str) -> Result<(), SkillError> {
        let sent = context.role().propagate_operation_to_children(
            context.services().clone(),
            operation,
            context.services().propagate_on_separate_tasks(),
        )?;
        debug!(role = %context.qualified_name(), operation = %operation, children = sent, "Propagated to children");
        Ok(())
    }
}

#[async_trait]
impl Skill for NetworkJoinSkill {
    fn class_name(&self) -> &str {
        NETWORK_JOIN_SKILL
    }

    fn understood_operations(&self) -> &[&'static str] {
        &[
            INITIALIZE_TASK,
            JOIN_ACKNOWLEDGED_TASK,
            DELEGATE_PERFORM_MISSION_TASK,
            PERFORM_MISSION_TASK,
            SHUTDOWN_AGENT_TASK,
        ]
    }

    fn lifecycle(&self) -> &SkillLifecycle {
        &self.lifecycle
    }

    fn join_acknowledged_policy(&self) -> JoinAcknowledgedPolicy {
        JoinAcknowledgedPolicy::AwaitMission
    }

    /// Only this role itself and its (mapped) parent may drive the join.
    fn is_operation_permitted(&self, context: &SkillContext, message: &Message) -> bool {
        let sender = message.sender_qualified_name();
        if sender == context.qualified_name() {
            return true;
        }
        match context.parent_qualified_name() {
            Ok(Some(parent)) => &parent == sender,
            _ => false,
        }
    }

    async fn receive_message(&self, context: &SkillContext, message: &Message) -> Result<(), SkillError> {
        match message.operation() {
            INITIALIZE_TASK => self.request_join(context),
            JOIN_ACKNOWLEDGED_TASK => self.acknowledged(context, message),
            DELEGATE_PERFORM_MISSION_TASK => self.delegated(context, message),
            PERFORM_MISSION_TASK => {
                info!(role = %context.qualified_name(), "Mission started");
                self.propagate(context, PERFORM_MISSION_TASK)
            }
            SHUTDOWN_AGENT_TASK => self.propagate(context, SHUTDOWN_AGENT_TASK),
            other => Err(SkillError::OperationNotSupported {
                skill: NETWORK_JOIN_SKILL.to_string(),
                operation: other.to_string(),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

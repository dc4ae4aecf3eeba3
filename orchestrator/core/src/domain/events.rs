// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::qualified_name::QualifiedName;
use crate::domain::skill::SkillState;

/// Observable facts about message handling inside one container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    MessageDelivered {
        role: QualifiedName,
        operation: String,
        skills: Vec<String>,
        delivered_at: DateTime<Utc>,
    },
    MessageNotUnderstood {
        role: QualifiedName,
        operation: String,
        sender: QualifiedName,
        occurred_at: DateTime<Utc>,
    },
    OperationNotPermitted {
        role: QualifiedName,
        operation: String,
        sender: QualifiedName,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    ProtocolViolation {
        role: QualifiedName,
        skill: String,
        operation: String,
        state: SkillState,
        occurred_at: DateTime<Utc>,
    },
    SkillStateChanged {
        role: QualifiedName,
        skill: String,
        from: SkillState,
        to: SkillState,
        changed_at: DateTime<Utc>,
    },
    ReplyTimedOut {
        sender: QualifiedName,
        recipient: QualifiedName,
        operation: String,
        reply_with: Uuid,
        recoverable: bool,
        expired_at: DateTime<Utc>,
    },
    RoleJoined {
        parent: QualifiedName,
        child: QualifiedName,
        joined_at: DateTime<Utc>,
    },
    MessageUndeliverable {
        sender: QualifiedName,
        recipient: QualifiedName,
        operation: String,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
}

impl RuntimeEvent {
    /// The role the event is about, when there is a single one.
    pub fn role(&self) -> &QualifiedName {
        match self {
            RuntimeEvent::MessageDelivered { role, .. }
            | RuntimeEvent::MessageNotUnderstood { role, .. }
            | RuntimeEvent::OperationNotPermitted { role, .. }
            | RuntimeEvent::ProtocolViolation { role, .. }
            | RuntimeEvent::SkillStateChanged { role, .. } => role,
            RuntimeEvent::ReplyTimedOut { sender, .. } | RuntimeEvent::MessageUndeliverable { sender, .. } => sender,
            RuntimeEvent::RoleJoined { parent, .. } => parent,
        }
    }
}

/// Publishing side of the event stream, implemented by the infrastructure event bus.
pub trait RuntimeEventSink: Send + Sync {
    fn publish(&self, event: RuntimeEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardEvents;

impl RuntimeEventSink for DiscardEvents {
    fn publish(&self, _event: RuntimeEvent) {}
}

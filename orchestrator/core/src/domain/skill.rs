// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Skills and the Skill Lifecycle
//!
//! A [`Skill`] is a unit of behaviour owned by exactly one role. Every skill
//! carries its own [`SkillLifecycle`], a three-state machine shared by all
//! skill kinds:
//!
//! ```text
//!                 INITIALIZE_TASK (founding container)
//!   UNINITIALIZED ─────────────────────────────────────────────► READY
//!        │                                                        ▲
//!        │ INITIALIZE_TASK (any other container)                  │ PERFORM_MISSION_TASK
//!        ▼                                                        │
//!   ISOLATED_FROM_NETWORK ───────────────────────────────────────┘
//!        ▲    │ JOIN_ACKNOWLEDGED_TASK (per JoinAcknowledgedPolicy)
//!        └────┘
//! ```
//!
//! Transitions are driven by operations only. An operation that arrives while
//! its precondition does not hold is rejected with
//! [`SkillError::InvalidStateTransition`]; the role answers the sender and
//! keeps serving everybody else.
//!
//! Subskills are ordinary skills that a role shares between its skills. They
//! are looked up by class identifier and created at most once per role.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use thiserror::Error;

use crate::domain::context::SkillContext;
use crate::domain::message::Message;
use crate::domain::operations::{
    is_shutdown_operation, INITIALIZE_TASK, JOIN_ACKNOWLEDGED_TASK, JOIN_NETWORK_SINGLETON_AGENT_INFO,
    PERFORM_MISSION_TASK,
};
use crate::domain::role::RoleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillState {
    Uninitialized,
    IsolatedFromNetwork,
    Ready,
}

impl fmt::Display for SkillState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::IsolatedFromNetwork => "ISOLATED_FROM_NETWORK",
            Self::Ready => "READY",
        };
        f.write_str(name)
    }
}

/// How a skill treats `JOIN_ACKNOWLEDGED_TASK`.
///
/// Skills differ here: some become usable as soon as their parent accepts
/// them, others wait for the delegated mission. Each skill states its rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinAcknowledgedPolicy {
    /// Requires `ISOLATED_FROM_NETWORK` and stays there until `PERFORM_MISSION_TASK`.
    AwaitMission,
    /// Requires `ISOLATED_FROM_NETWORK` and moves to `READY`.
    PromoteToReady,
    /// Accepted as a no-op in any initialized state.
    Tolerate,
}

#[derive(Debug, Error)]
pub enum SkillError {
    #[error("Operation {operation} is not legal for skill {skill} in state {state}")]
    InvalidStateTransition {
        skill: String,
        operation: String,
        state: SkillState,
    },

    #[error("Operation {operation} is not permitted for {sender}")]
    NotPermitted { operation: String, sender: String },

    #[error("Skill {skill} does not support operation {operation}")]
    OperationNotSupported { skill: String, operation: String },

    #[error("Missing or invalid parameter '{0}'")]
    MissingParameter(String),

    #[error("Skill failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Role(Box<RoleError>),
}

impl From<RoleError> for SkillError {
    fn from(err: RoleError) -> Self {
        SkillError::Role(Box::new(err))
    }
}

/// Outcome of a successful [`SkillLifecycle::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged(SkillState),
    Changed { from: SkillState, to: SkillState },
}

/// The state cell of one skill instance.
#[derive(Debug)]
pub struct SkillLifecycle {
    state: Mutex<SkillState>,
}

impl SkillLifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SkillState::Uninitialized),
        }
    }

    pub fn state(&self) -> SkillState {
        *self.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SkillState::Ready
    }

    /// Checks the precondition of `operation` and applies its transition atomically.
    pub fn admit(
        &self,
        skill: &str,
        operation: &str,
        founding_container: bool,
        policy: JoinAcknowledgedPolicy,
    ) -> Result<Transition, SkillError> {
        use SkillState::*;

        let mut state = self.state.lock();
        let current = *state;
        let violation = || SkillError::InvalidStateTransition {
            skill: skill.to_string(),
            operation: operation.to_string(),
            state: current,
        };

        let next = match operation {
            INITIALIZE_TASK => match current {
                Uninitialized if founding_container => Ready,
                Uninitialized => IsolatedFromNetwork,
                _ => return Err(violation()),
            },
            JOIN_ACKNOWLEDGED_TASK => match (policy, current) {
                (JoinAcknowledgedPolicy::AwaitMission, IsolatedFromNetwork) => IsolatedFromNetwork,
                (JoinAcknowledgedPolicy::PromoteToReady, IsolatedFromNetwork) => Ready,
                (JoinAcknowledgedPolicy::Tolerate, IsolatedFromNetwork | Ready) => current,
                _ => return Err(violation()),
            },
            PERFORM_MISSION_TASK => match current {
                IsolatedFromNetwork | Ready => Ready,
                Uninitialized => return Err(violation()),
            },
            JOIN_NETWORK_SINGLETON_AGENT_INFO => match current {
                Ready => Ready,
                _ => return Err(violation()),
            },
            op if is_shutdown_operation(op) => match current {
                Ready => Ready,
                _ => return Err(violation()),
            },
            _ => match current {
                Uninitialized => return Err(violation()),
                other => other,
            },
        };

        *state = next;
        Ok(if next == current {
            Transition::Unchanged(current)
        } else {
            Transition::Changed { from: current, to: next }
        })
    }
}

impl Default for SkillLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// A pluggable behaviour unit bound to one role.
#[async_trait]
pub trait Skill: Send + Sync + 'static {
    /// Class identifier this instance was created from.
    fn class_name(&self) -> &str;

    /// Operations this skill handles when a message names no recipient service.
    fn understood_operations(&self) -> &[&'static str];

    fn lifecycle(&self) -> &SkillLifecycle;

    fn join_acknowledged_policy(&self) -> JoinAcknowledgedPolicy {
        JoinAcknowledgedPolicy::AwaitMission
    }

    /// Authorization hook, consulted before the lifecycle gate.
    fn is_operation_permitted(&self, _context: &SkillContext, _message: &Message) -> bool {
        true
    }

    /// Asynchronous inbound handler.
    async fn receive_message(&self, context: &SkillContext, message: &Message) -> Result<(), SkillError>;

    /// Synchronous request/response handler.
    fn converse_message(&self, _context: &SkillContext, message: &Message) -> Result<Message, SkillError> {
        Err(SkillError::OperationNotSupported {
            skill: self.class_name().to_string(),
            operation: message.operation().to_string(),
        })
    }

    fn as_any(&self) -> &dyn Any;

    fn understands(&self, operation: &str) -> bool {
        self.understood_operations().contains(&operation)
    }

    fn state(&self) -> SkillState {
        self.lifecycle().state()
    }
}

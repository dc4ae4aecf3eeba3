// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Operation Vocabulary
//!
//! Case-sensitive operation strings exchanged between roles. These are the
//! de facto wire protocol between containers and must not be renamed.
//!
//! | Suffix | Meaning |
//! |--------|---------|
//! | `_TASK` | A request for the recipient to do something |
//! | `_INFO` | A notification; never answered except by a diagnostic |

pub const INITIALIZE_TASK: &str = "INITIALIZE_TASK";
pub const JOIN_ACKNOWLEDGED_TASK: &str = "JOIN_ACKNOWLEDGED_TASK";
pub const PERFORM_MISSION_TASK: &str = "PERFORM_MISSION_TASK";
pub const DELEGATE_PERFORM_MISSION_TASK: &str = "DELEGATE_PERFORM_MISSION_TASK";
pub const JOIN_NETWORK_SINGLETON_AGENT_INFO: &str = "JOIN_NETWORK_SINGLETON_AGENT_INFO";
pub const MESSAGE_NOT_UNDERSTOOD_INFO: &str = "MESSAGE_NOT_UNDERSTOOD_INFO";
pub const OPERATION_NOT_PERMITTED_INFO: &str = "OPERATION_NOT_PERMITTED_INFO";
pub const TASK_ACCOMPLISHED_INFO: &str = "TASK_ACCOMPLISHED_INFO";

pub const SHUTDOWN_AGENT_TASK: &str = "SHUTDOWN_AGENT_TASK";
pub const SHUTDOWN_CONTAINER_TASK: &str = "SHUTDOWN_CONTAINER_TASK";
pub const SHUTDOWN_NETWORK_TASK: &str = "SHUTDOWN_NETWORK_TASK";

/// Parameter names shared by the runtime and the protocol skills.
pub mod parameters {
    /// Accumulated hop summaries of a diagnostic chain.
    pub const TRACE: &str = "trace";
    /// The original message carried by a diagnostic reply.
    pub const MESSAGE: &str = "message";
    /// Human-readable rejection reason.
    pub const REASON: &str = "reason";
    /// The sender's public certificate.
    pub const CERTIFICATE: &str = "certificate";
    /// Container scoping a delegated operation.
    pub const CONTAINER: &str = "container";
}

/// `SHUTDOWN_*_TASK` family.
pub fn is_shutdown_operation(operation: &str) -> bool {
    operation.len() > "SHUTDOWN__TASK".len()
        && operation.starts_with("SHUTDOWN_")
        && operation.ends_with("_TASK")
}

/// Diagnostics terminate a conversation; they never provoke further diagnostics.
pub fn is_diagnostic_operation(operation: &str) -> bool {
    operation == MESSAGE_NOT_UNDERSTOOD_INFO || operation == OPERATION_NOT_PERMITTED_INFO
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod bootstrap;
pub mod definition_store;
pub mod node_runtime;

// Re-export use cases for convenience
pub use bootstrap::{build_container, start_container};
pub use definition_store::{DefinitionStore, StoredNode};
pub use node_runtime::{MessagingSettings, NodeRuntime, RoleStatus, RuntimeCollaborators, RuntimeError};

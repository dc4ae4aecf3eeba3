// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Join protocol skills
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Skills that react to the join vocabulary on behalf of their role

pub mod catalogue;
pub mod network_join;
pub mod network_singleton;

pub use catalogue::{register_skills, skill_factory};
pub use network_join::{NetworkJoinSkill, NETWORK_JOIN_SKILL};
pub use network_singleton::{NetworkSingletonSkill, NETWORK_SINGLETON_SKILL};

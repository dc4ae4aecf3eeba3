// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain model of the Agora control runtime.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Addressing, messages, skills, roles, nodes and the
//!   collaborator contracts the runtime depends on

pub mod qualified_name;
pub mod operations;
pub mod message;
pub mod crypto;
pub mod skill;
pub mod skill_factory;
pub mod context;
pub mod role;
pub mod node;
pub mod runtime_configuration;
pub mod singleton_hosts;
pub mod conversation;
pub mod reply_timeouts;
pub mod events;
pub mod transport;
pub mod repository;
pub mod container_config;

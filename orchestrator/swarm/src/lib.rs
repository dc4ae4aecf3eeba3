// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `agora-swarm`: Network Singleton Join Protocol
//!
//! Lets a container that starts after the network was founded attach its
//! roles beneath the network-wide singleton host of their parent agent.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `PeerCredentials` subskill |
//! | [`application`] | Application | `NetworkSingletonSkill`, `NetworkJoinSkill`, skill catalogue |
//!
//! ## Key Concepts
//!
//! - **Network singleton**: an agent with exactly one live instance on the
//!   network. Its host container is looked up in the singleton hosting table.
//! - **Join**: the handshake by which a child role in a joining container is
//!   recorded by the singleton host and handed its mission.
//!
//! Register the skills with [`register_skills`] before bootstrapping a
//! container whose roles declare them.

pub mod domain;
pub mod application;

pub use application::{register_skills, skill_factory};
pub use domain::*;

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agora core
//!
//! Addressable roles organised into nodes and containers, skill dispatch with
//! a three-state lifecycle, signed cross-container messaging and the runtime
//! that hosts them.
//!
//! # Architecture
//!
//! - **domain:** value types, aggregates and collaborator contracts
//! - **application:** container runtime, bootstrap and definition persistence
//! - **infrastructure:** Ed25519 signing, in-process transport, event bus, in-memory repositories

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;

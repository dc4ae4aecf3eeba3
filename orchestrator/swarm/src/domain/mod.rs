// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Layer
//!
//! Per-role state shared by the join protocol skills.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`peer_credentials`] | `PeerCredentials`, `PeerRecord`, `PeerRelation` |

pub mod peer_credentials;

pub use peer_credentials::*;

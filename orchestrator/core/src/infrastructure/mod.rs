// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod repositories;
pub mod signing;
pub mod transport;

pub use event_bus::{EventBus, EventBusError, EventReceiver, RoleEventReceiver};
pub use signing::{Ed25519CryptoProvider, InMemoryKeyStore};
pub use transport::InProcessNetwork;

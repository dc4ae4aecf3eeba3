// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Transport collaborator contract.
//!
//! Delivery is fire-and-forget: `deliver` hands the message over and returns.
//! Implementations must keep messages between one sender and one recipient in
//! order; nothing is promised across different pairs.

use thiserror::Error;

use crate::domain::message::Message;
use crate::domain::qualified_name::QualifiedName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("No route to {0}")]
    NoRoute(QualifiedName),

    #[error("Mailbox of {0} is closed")]
    MailboxClosed(QualifiedName),
}

pub trait MessageTransport: Send + Sync {
    fn deliver(&self, message: Message) -> Result<(), TransportError>;
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-process network.
//!
//! Connects any number of [`NodeRuntime`]s living in one process. Every
//! attached role gets an unbounded mailbox drained by its own task, so
//! messages to one role are handled in arrival order while different roles
//! progress concurrently. A mailbox task holds only a weak reference to its
//! runtime and ends when the runtime is dropped or the role is detached.

use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::node_runtime::NodeRuntime;
use crate::domain::message::Message;
use crate::domain::qualified_name::QualifiedName;
use crate::domain::transport::{MessageTransport, TransportError};

#[derive(Default)]
pub struct InProcessNetwork {
    mailboxes: DashMap<QualifiedName, mpsc::UnboundedSender<Message>>,
}

impl InProcessNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a mailbox for every role of `runtime` not already routed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(&self, runtime: &Arc<NodeRuntime>) -> usize {
        let mut opened = 0;
        for role in runtime.local_roles() {
            if self.mailboxes.contains_key(&role) {
                continue;
            }
            let (sender, receiver) = mpsc::unbounded_channel();
            self.mailboxes.insert(role.clone(), sender);
            tokio::spawn(drain_mailbox(role, Arc::downgrade(runtime), receiver));
            opened += 1;
        }
        info!(routes = self.mailboxes.len(), opened, "Runtime attached to in-process network");
        opened
    }

    /// Closes the mailboxes of every role hosted in `container`.
    pub fn detach(&self, container: &str) -> usize {
        let before = self.mailboxes.len();
        self.mailboxes.retain(|role, _| role.container_name() != container);
        let closed = before - self.mailboxes.len();
        info!(container = %container, closed, "Container detached from in-process network");
        closed
    }

    pub fn routes(&self) -> Vec<QualifiedName> {
        let mut routes: Vec<QualifiedName> = self.mailboxes.iter().map(|entry| entry.key().clone()).collect();
        routes.sort();
        routes
    }

    pub fn is_routed(&self, role: &QualifiedName) -> bool {
        self.mailboxes.contains_key(role)
    }
}

async fn drain_mailbox(role: QualifiedName, runtime: Weak<NodeRuntime>, mut receiver: mpsc::UnboundedReceiver<Message>) {
    debug!(role = %role, "Mailbox opened");
    while let Some(message) = receiver.recv().await {
        let Some(runtime) = runtime.upgrade() else {
            break;
        };
        if let Err(e) = runtime.dispatch(message).await {
            warn!(role = %role, error = %e, "Dispatch failed");
        }
    }
    debug!(role = %role, "Mailbox closed");
}

impl MessageTransport for InProcessNetwork {
    fn deliver(&self, message: Message) -> Result<(), TransportError> {
        let recipient = message.recipient_qualified_name().clone();
        let sender = self
            .mailboxes
            .get(&recipient)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::NoRoute(recipient.clone()))?;
        sender
            .send(message)
            .map_err(|_| TransportError::MailboxClosed(recipient))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::operations::INITIALIZE_TASK;

    #[test]
    fn test_deliver_without_route_fails() {
        let network = InProcessNetwork::new();
        let role = QualifiedName::parse("Mint.Mint.MintRole").unwrap();
        let message = Message::builder(role.clone(), role.clone(), INITIALIZE_TASK).build();
        assert_eq!(network.deliver(message), Err(TransportError::NoRoute(role)));
    }

    #[tokio::test]
    async fn test_detach_removes_container_routes() {
        let network = InProcessNetwork::new();
        let (mint_tx, _mint_rx) = mpsc::unbounded_channel();
        let (alice_tx, _alice_rx) = mpsc::unbounded_channel();
        network
            .mailboxes
            .insert(QualifiedName::parse("Mint.Mint.MintRole").unwrap(), mint_tx);
        network
            .mailboxes
            .insert(QualifiedName::parse("Alice.Alice.AliceRole").unwrap(), alice_tx);

        assert_eq!(network.detach("Mint"), 1);
        let routes: Vec<String> = network.routes().iter().map(|r| r.to_string()).collect();
        assert_eq!(routes, vec!["Alice.Alice.AliceRole"]);
    }

    #[tokio::test]
    async fn test_closed_mailbox_is_reported() {
        let network = InProcessNetwork::new();
        let role = QualifiedName::parse("Mint.Mint.MintRole").unwrap();
        let (sender, receiver) = mpsc::unbounded_channel();
        drop(receiver);
        network.mailboxes.insert(role.clone(), sender);

        let message = Message::builder(role.clone(), role.clone(), INITIALIZE_TASK).build();
        assert_eq!(network.deliver(message), Err(TransportError::MailboxClosed(role)));
    }
}

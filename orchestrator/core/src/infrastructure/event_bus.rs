// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Event Bus Implementation - Pub/Sub for Runtime Events
//
// In-memory event streaming over a tokio broadcast channel. Feeds the CLI,
// tests and any other observer of dispatch outcomes and skill transitions.
//
// Events are not persisted; a slow receiver loses the oldest ones.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::{RuntimeEvent, RuntimeEventSink};
use crate::domain::qualified_name::QualifiedName;

/// Event bus for publishing and subscribing to runtime events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<RuntimeEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Subscribe to all runtime events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe and filter for events about a single role
    pub fn subscribe_role(&self, role: QualifiedName) -> RoleEventReceiver {
        RoleEventReceiver {
            receiver: self.sender.subscribe(),
            role,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl RuntimeEventSink for EventBus {
    fn publish(&self, event: RuntimeEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is listening
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all runtime events
pub struct EventReceiver {
    receiver: broadcast::Receiver<RuntimeEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<RuntimeEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<RuntimeEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver for events about one role (filtered)
pub struct RoleEventReceiver {
    receiver: broadcast::Receiver<RuntimeEvent>,
    role: QualifiedName,
}

impl RoleEventReceiver {
    /// Receive the next event whose subject is the subscribed role
    pub async fn recv(&mut self) -> Result<RuntimeEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    fn matches(&self, event: &RuntimeEvent) -> bool {
        match event {
            RuntimeEvent::RoleJoined { parent, child, .. } => parent == &self.role || child == &self.role,
            RuntimeEvent::ReplyTimedOut { sender, recipient, .. }
            | RuntimeEvent::MessageUndeliverable { sender, recipient, .. } => {
                sender == &self.role || recipient == &self.role
            }
            other => other.role() == &self.role,
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

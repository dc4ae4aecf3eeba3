// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Reply Timeouts
//!
//! The only place a sender waits on the network. A sender registers the
//! message it expects an answer to; the record is keyed by the message's
//! `reply_with` id.
//!
//! ```text
//! register ──► pending ──(reply with in_reply_to == reply_with)──► removed
//!                 │
//!                 └──(deadline)──► recoverable:     recovery action runs
//!                                  non-recoverable: error log + ReplyTimedOut event
//! ```
//!
//! Cancellation only removes the record. Timed-out messages are never
//! re-sent by this module.

use chrono::Utc;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::domain::events::{RuntimeEvent, RuntimeEventSink};
use crate::domain::message::Message;
use crate::domain::qualified_name::QualifiedName;

pub type RecoveryAction = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send + Sync>;

struct PendingReply {
    sender: QualifiedName,
    recipient: QualifiedName,
    operation: String,
    recoverable: bool,
    recovery: Option<RecoveryAction>,
}

#[derive(Clone)]
pub struct ReplyTimeouts {
    pending: Arc<DashMap<Uuid, PendingReply>>,
    events: Arc<dyn RuntimeEventSink>,
}

impl ReplyTimeouts {
    pub fn new(events: Arc<dyn RuntimeEventSink>) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            events,
        }
    }

    /// Starts the clock for `message`. Must be called from within a tokio runtime.
    pub fn register(
        &self,
        message: &Message,
        timeout: Duration,
        recoverable: bool,
        recovery: Option<RecoveryAction>,
    ) {
        let reply_with = message.reply_with();
        self.pending.insert(
            reply_with,
            PendingReply {
                sender: message.sender_qualified_name().clone(),
                recipient: message.recipient_qualified_name().clone(),
                operation: message.operation().to_string(),
                recoverable,
                recovery,
            },
        );

        debug!(
            reply_with = %reply_with,
            operation = %message.operation(),
            timeout_ms = timeout.as_millis() as u64,
            "Reply timeout registered"
        );

        let pending = self.pending.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let Some((_, expired)) = pending.remove(&reply_with) else {
                return;
            };
            metrics::counter!("agora_reply_timeouts_total").increment(1);

            match (expired.recoverable, expired.recovery) {
                (true, Some(recovery)) => {
                    warn!(
                        reply_with = %reply_with,
                        operation = %expired.operation,
                        recipient = %expired.recipient,
                        "Reply timed out; running recovery"
                    );
                    recovery().await;
                }
                (recoverable, _) => {
                    if recoverable {
                        warn!(
                            reply_with = %reply_with,
                            operation = %expired.operation,
                            "Reply timed out with no recovery action"
                        );
                    } else {
                        error!(
                            reply_with = %reply_with,
                            operation = %expired.operation,
                            sender = %expired.sender,
                            recipient = %expired.recipient,
                            "Reply timed out; conversation stalled"
                        );
                    }
                    events.publish(RuntimeEvent::ReplyTimedOut {
                        sender: expired.sender,
                        recipient: expired.recipient,
                        operation: expired.operation,
                        reply_with,
                        recoverable,
                        expired_at: Utc::now(),
                    });
                }
            }
        });
    }

    /// Clears the record answered by `reply`. Returns `true` if one was pending.
    ///
    /// The reply must travel back along the original route: from the role the
    /// request was addressed to (container segment aside, since singleton
    /// mapping may rewrite it) to the role that sent it.
    pub fn observe_reply(&self, reply: &Message) -> bool {
        let Some(in_reply_to) = reply.in_reply_to() else {
            return false;
        };
        let observed = self
            .pending
            .remove_if(&in_reply_to, |_, pending| {
                &pending.sender == reply.recipient_qualified_name()
                    && pending.recipient.agent_role_name() == reply.sender_qualified_name().agent_role_name()
            })
            .is_some();
        if observed {
            debug!(reply_with = %in_reply_to, "Reply observed before deadline");
        } else if self.pending.contains_key(&in_reply_to) {
            warn!(
                reply_with = %in_reply_to,
                sender = %reply.sender_qualified_name(),
                "Reply from unexpected role ignored"
            );
        }
        observed
    }

    pub fn cancel(&self, reply_with: Uuid) -> bool {
        self.pending.remove(&reply_with).is_some()
    }

    pub fn is_pending(&self, reply_with: Uuid) -> bool {
        self.pending.contains_key(&reply_with)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::operations::{JOIN_ACKNOWLEDGED_TASK, JOIN_NETWORK_SINGLETON_AGENT_INFO};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<RuntimeEvent>>);

    impl RuntimeEventSink for CollectingSink {
        fn publish(&self, event: RuntimeEvent) {
            self.0.lock().push(event);
        }
    }

    fn join_message() -> Message {
        Message::builder(
            QualifiedName::parse("Alice.Mint.MintRole").unwrap(),
            QualifiedName::parse("Mint.Mint.MintRole").unwrap(),
            JOIN_NETWORK_SINGLETON_AGENT_INFO,
        )
        .build()
    }

    #[tokio::test]
    async fn test_observed_reply_cancels_timeout() {
        let sink = Arc::new(CollectingSink::default());
        let timeouts = ReplyTimeouts::new(sink.clone());
        let message = join_message();

        timeouts.register(&message, Duration::from_millis(20), false, None);
        assert!(timeouts.is_pending(message.reply_with()));
        let reply = Message::reply_to(&message, JOIN_ACKNOWLEDGED_TASK).build();
        assert!(timeouts.observe_reply(&reply));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(sink.0.lock().is_empty());
        assert_eq!(timeouts.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_recoverable_timeout_runs_recovery_once() {
        let sink = Arc::new(CollectingSink::default());
        let timeouts = ReplyTimeouts::new(sink.clone());
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        timeouts.register(
            &join_message(),
            Duration::from_millis(10),
            true,
            Some(Box::new(move || {
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })),
        );

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(sink.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_non_recoverable_timeout_publishes_event() {
        let sink = Arc::new(CollectingSink::default());
        let timeouts = ReplyTimeouts::new(sink.clone());
        let message = join_message();

        timeouts.register(&message, Duration::from_millis(10), false, None);
        tokio::time::sleep(Duration::from_millis(80)).await;

        let events = sink.0.lock();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RuntimeEvent::ReplyTimedOut { reply_with, recoverable, .. } => {
                assert_eq!(*reply_with, message.reply_with());
                assert!(!recoverable);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reply_from_other_role_keeps_timeout() {
        let timeouts = ReplyTimeouts::new(Arc::new(crate::domain::events::DiscardEvents));
        let message = join_message();
        timeouts.register(&message, Duration::from_secs(5), false, None);

        let forged = Message::builder(
            QualifiedName::parse("Evil.Evil.EvilRole").unwrap(),
            message.sender_qualified_name().clone(),
            JOIN_ACKNOWLEDGED_TASK,
        )
        .in_reply_to(message.reply_with())
        .build();
        assert!(!timeouts.observe_reply(&forged));
        assert!(timeouts.is_pending(message.reply_with()));

        // Singleton mapping may have moved the addressee to another container.
        let mapped = Message::builder(
            QualifiedName::parse("Vault.Mint.MintRole").unwrap(),
            message.sender_qualified_name().clone(),
            JOIN_ACKNOWLEDGED_TASK,
        )
        .in_reply_to(message.reply_with())
        .build();
        assert!(timeouts.observe_reply(&mapped));
        assert!(!timeouts.is_pending(message.reply_with()));
    }

    #[tokio::test]
    async fn test_cancel_removes_record() {
        let timeouts = ReplyTimeouts::new(Arc::new(crate::domain::events::DiscardEvents));
        let message = join_message();
        timeouts.register(&message, Duration::from_secs(5), false, None);
        assert!(timeouts.cancel(message.reply_with()));
        assert!(!timeouts.cancel(message.reply_with()));
    }
}

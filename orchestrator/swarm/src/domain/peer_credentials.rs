// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Peer Credentials Subskill
//!
//! Remembers the certificates exchanged during network joins, per role. Both
//! sides of the handshake share the class: the singleton host records every
//! child that joined beneath it, and the joining role records its parent.
//!
//! The subskill understands no operations of its own. It is reached through
//! [`SkillContext::subskill`](agora_core::domain::context::SkillContext::subskill)
//! and is instantiated at most once per role.

use agora_core::domain::context::SkillContext;
use agora_core::domain::crypto::{Certificate, CertificateDirectory};
use agora_core::domain::message::Message;
use agora_core::domain::qualified_name::QualifiedName;
use agora_core::domain::skill::{Skill, SkillError, SkillLifecycle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const PEER_CREDENTIALS: &str = "PeerCredentials";

/// How a peer relates to the role holding the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRelation {
    Parent,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerRecord {
    pub certificate: Certificate,
    pub relation: PeerRelation,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct PeerCredentials {
    lifecycle: SkillLifecycle,
    peers: RwLock<BTreeMap<QualifiedName, PeerRecord>>,
}

impl PeerCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the shared instance on the context's role.
    pub fn of(context: &SkillContext) -> Result<Arc<dyn Skill>, SkillError> {
        Ok(context.subskill(PEER_CREDENTIALS)?)
    }

    /// Stores `certificate` under its subject, replacing any earlier record.
    /// Returns `true` when the peer was not known before.
    pub fn record(&self, certificate: Certificate, relation: PeerRelation) -> bool {
        let subject = certificate.subject.clone();
        self.peers
            .write()
            .insert(
                subject,
                PeerRecord {
                    certificate,
                    relation,
                    recorded_at: Utc::now(),
                },
            )
            .is_none()
    }

    pub fn peer(&self, subject: &QualifiedName) -> Option<PeerRecord> {
        self.peers.read().get(subject).cloned()
    }

    pub fn children(&self) -> Vec<QualifiedName> {
        self.peers
            .read()
            .iter()
            .filter(|(_, record)| record.relation == PeerRelation::Child)
            .map(|(subject, _)| subject.clone())
            .collect()
    }

    pub fn forget(&self, subject: &QualifiedName) -> Option<PeerRecord> {
        self.peers.write().remove(subject)
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

/// Downcasts a subskill handle obtained from [`PeerCredentials::of`].
pub fn peer_credentials(skill: &Arc<dyn Skill>) -> Result<&PeerCredentials, SkillError> {
    skill
        .as_any()
        .downcast_ref::<PeerCredentials>()
        .ok_or_else(|| SkillError::Failed(format!("{} is registered with the wrong type", PEER_CREDENTIALS)))
}

impl CertificateDirectory for PeerCredentials {
    fn certificate_for(&self, role: &QualifiedName) -> Option<Certificate> {
        self.peers.read().get(role).map(|record| record.certificate.clone())
    }
}

#[async_trait]
impl Skill for PeerCredentials {
    fn class_name(&self) -> &str {
        PEER_CREDENTIALS
    }

    fn understood_operations(&self) -> &[&'static str] {
        &[]
    }

    fn lifecycle(&self) -> &SkillLifecycle {
        &self.lifecycle
    }

    async fn receive_message(&self, _context: &SkillContext, message: &Message) -> Result<(), SkillError> {
        Err(SkillError::OperationNotSupported {
            skill: PEER_CREDENTIALS.to_string(),
            operation: message.operation().to_string(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn certificate(subject: &str, key: u8) -> Certificate {
        Certificate {
            subject: QualifiedName::parse(subject).unwrap(),
            public_key: vec![key; 32],
        }
    }

    #[test]
    fn test_record_replaces_and_reports_novelty() {
        let peers = PeerCredentials::new();
        assert!(peers.record(certificate("Alice.Alice.AliceRole", 1), PeerRelation::Child));
        assert!(!peers.record(certificate("Alice.Alice.AliceRole", 2), PeerRelation::Child));
        assert!(peers.record(certificate("Bob.Bob.BobRole", 3), PeerRelation::Child));
        assert!(peers.record(certificate("Mint.Mint.MintRole", 4), PeerRelation::Parent));

        let alice = QualifiedName::parse("Alice.Alice.AliceRole").unwrap();
        assert_eq!(peers.certificate_for(&alice).unwrap().public_key, vec![2; 32]);
        assert_eq!(peers.len(), 3);
        assert_eq!(peers.children().len(), 2);

        assert!(peers.forget(&alice).is_some());
        assert!(peers.certificate_for(&alice).is_none());
    }

    #[test]
    fn test_peer_record_serializes_relation() {
        let peers = PeerCredentials::new();
        peers.record(certificate("Mint.Mint.MintRole", 4), PeerRelation::Parent);
        let record = peers.peer(&QualifiedName::parse("Mint.Mint.MintRole").unwrap()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["relation"], "parent");
        assert_eq!(json["certificate"]["subject"], "Mint.Mint.MintRole");
    }
}

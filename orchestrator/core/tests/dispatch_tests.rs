// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use agora_core::application::bootstrap::build_container;
use agora_core::application::node_runtime::{NodeRuntime, RuntimeCollaborators};
use agora_core::domain::container_config::ContainerConfigManifest;
use agora_core::domain::context::{ContainerServices, SkillContext};
use agora_core::domain::crypto::{CertificateDirectory, CryptoProvider};
use agora_core::domain::message::Message;
use agora_core::domain::operations::{
    parameters, INITIALIZE_TASK, JOIN_ACKNOWLEDGED_TASK, JOIN_NETWORK_SINGLETON_AGENT_INFO, MESSAGE_NOT_UNDERSTOOD_INFO, OPERATION_NOT_PERMITTED_INFO, TASK_ACCOMPLISHED_INFO,
};
use agora_core::domain::qualified_name::QualifiedName;
use agora_core::domain::role::{DispatchOutcome, RoleError};
use agora_core::domain::skill::{Skill, SkillError, SkillLifecycle, SkillState};
use agora_core::domain::skill_factory::SkillFactory;
use agora_core::domain::transport::{MessageTransport, TransportError};
use agora_core::infrastructure::event_bus::EventBus;
use agora_core::infrastructure::signing::{Ed25519CryptoProvider, InMemoryKeyStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Ledger {
    class: &'static str,
    lifecycle: SkillLifecycle,
}

impl Ledger {
    fn named(class: &'static str) -> Arc<dyn Skill> {
        Arc::new(Ledger {
            class,
            lifecycle: SkillLifecycle::new(),
        })
    }
}

#[async_trait]
impl Skill for Ledger {
    fn class_name(&self) -> &str {
        self.class
    }

    fn understood_operations(&self) -> &[&'static str] {
        &[INITIALIZE_TASK, TASK_ACCOMPLISHED_INFO]
    }

    fn lifecycle(&self) -> &SkillLifecycle {
        &self.lifecycle
    }

    async fn receive_message(&self, _context: &SkillContext, _message: &Message) -> Result<(), SkillError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Captures outbound traffic instead of routing it.
#[derive(Default)]
struct RecordingTransport {
    delivered: Mutex<Vec<Message>>,
}

impl RecordingTransport {
    fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.delivered.lock())
    }
}

impl MessageTransport for RecordingTransport {
    fn deliver(&self, message: Message) -> Result<(), TransportError> {
        self.delivered.lock().push(message);
        Ok(())
    }
}

const MINT: &str = r#"
apiVersion: agora.dev/v1
kind: ContainerConfig
metadata:
  name: mint
spec:
  container:
    name: Mint
    founding: true
  nodes:
    - name: LedgerAgent
      roles:
        - name: LedgerRole
          skills: [LedgerSkill]
          remote_communications_permitted: true
        - name: AuditRole
          skills: [LedgerSkill]
    - name: JournalAgent
      roles:
        - name: JournalRole
          skills: [LedgerSkill, JournalSkill]
"#;

const ALICE: &str = r#"
apiVersion: agora.dev/v1
kind: ContainerConfig
metadata:
  name: alice
spec:
  container:
    name: Alice
  nodes:
    - name: TellerAgent
      roles:
        - name: TellerRole
          skills: [LedgerSkill]
          remote_communications_permitted: true
        - name: ClerkRole
          skills: [LedgerSkill]
"#;

struct Harness {
    runtime: Arc<NodeRuntime>,
    transport: Arc<RecordingTransport>,
}

fn factory(instantiations: Arc<AtomicUsize>) -> SkillFactory {
    let mut factory = SkillFactory::new();
    factory
        .register("LedgerSkill", move || {
            instantiations.fetch_add(1, Ordering::SeqCst);
            Ledger::named("LedgerSkill")
        })
        .register("JournalSkill", || Ledger::named("JournalSkill"));
    factory
}

fn harness(yaml: &str, keys: Arc<InMemoryKeyStore>) -> Harness {
    let transport = Arc::new(RecordingTransport::default());
    let collaborators = RuntimeCollaborators {
        skill_factory: Arc::new(factory(Arc::new(AtomicUsize::new(0)))),
        crypto: Arc::new(Ed25519CryptoProvider::new()),
        certificates: keys.clone(),
        credentials: keys,
        transport: transport.clone(),
        events: Arc::new(EventBus::with_default_capacity()),
    };
    let manifest = ContainerConfigManifest::from_yaml_str(yaml).unwrap();
    Harness {
        runtime: build_container(&manifest, collaborators).unwrap(),
        transport,
    }
}

fn qn(name: &str) -> QualifiedName {
    QualifiedName::parse(name).unwrap()
}

#[tokio::test]
async fn test_unknown_operation_gets_not_understood_reply() {
    let mint = harness(MINT, Arc::new(InMemoryKeyStore::new()));
    let message = Message::builder(qn("Mint.Ledger.AuditRole"), qn("Mint.Ledger.LedgerRole"), "AUDIT_TASK")
        .parameter(parameters::TRACE, "Mint.Ledger.AuditRole asked for an audit")
        .build();

    let outcome = mint.runtime.dispatch(message.clone()).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::NotUnderstood);

    let sent = mint.transport.take();
    assert_eq!(sent.len(), 1);
    let reply = &sent[0];
    assert_eq!(reply.operation(), MESSAGE_NOT_UNDERSTOOD_INFO);
    assert_eq!(reply.recipient_qualified_name(), message.sender_qualified_name());
    assert_eq!(reply.in_reply_to(), Some(message.reply_with()));
    assert_eq!(reply.conversation_id(), message.conversation_id());
    assert_eq!(
        reply.trace(),
        Some(
            "Mint.Ledger.AuditRole asked for an audit\n\
             Mint.Ledger.LedgerRole did not understand AUDIT_TASK from Mint.Ledger.AuditRole"
        )
    );
    assert_eq!(reply.message_parameter(), Some(&message));
}

#[tokio::test]
async fn test_uninitialized_skill_rejects_with_not_permitted() {
    let mint = harness(MINT, Arc::new(InMemoryKeyStore::new()));
    let message = Message::builder(qn("Mint.Ledger.AuditRole"), qn("Mint.Ledger.LedgerRole"), TASK_ACCOMPLISHED_INFO)
        .build();

    let outcome = mint.runtime.dispatch(message).await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::NotPermitted { .. }));

    let sent = mint.transport.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].operation(), OPERATION_NOT_PERMITTED_INFO);
    assert!(sent[0].text_parameter(parameters::REASON).is_some());
}

#[tokio::test]
async fn test_incoming_not_understood_is_absorbed() {
    let mint = harness(MINT, Arc::new(InMemoryKeyStore::new()));
    let diagnostic = Message::builder(
        qn("Mint.Ledger.AuditRole"),
        qn("Mint.Ledger.LedgerRole"),
        MESSAGE_NOT_UNDERSTOOD_INFO,
    )
    .build();

    let outcome = mint.runtime.dispatch(diagnostic).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::Ignored);
    assert!(mint.transport.take().is_empty());
}

#[tokio::test]
async fn test_initialize_promotes_founding_skill_to_ready() {
    let mint = harness(MINT, Arc::new(InMemoryKeyStore::new()));
    let role = qn("Mint.Ledger.LedgerRole");

    let outcome = mint
        .runtime
        .dispatch(Message::builder(role.clone(), role.clone(), INITIALIZE_TASK).build())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome::Delivered {
            skills: vec!["LedgerSkill".to_string()]
        }
    );
    assert_eq!(mint.runtime.skill_state(&role, "LedgerSkill"), Some(SkillState::Ready));

    // A second initialization is a protocol violation.
    let again = mint
        .runtime
        .dispatch(Message::builder(role.clone(), role.clone(), INITIALIZE_TASK).build())
        .await
        .unwrap();
    assert!(matches!(again, DispatchOutcome::NotPermitted { .. }));
}

#[tokio::test]
async fn test_only_cross_container_sends_from_remote_roles_are_signed() {
    let keys = Arc::new(InMemoryKeyStore::new());
    let mint = harness(MINT, keys.clone());

    mint.runtime
        .send(Message::builder(qn("Mint.Ledger.LedgerRole"), qn("Mint.Ledger.AuditRole"), TASK_ACCOMPLISHED_INFO).build())
        .unwrap();
    mint.runtime
        .send(
            Message::builder(qn("Mint.Ledger.LedgerRole"), qn("Alice.Teller.TellerRole"), TASK_ACCOMPLISHED_INFO)
                .parameter(parameters::TRACE, "ledger closed")
                .build(),
        )
        .unwrap();
    mint.runtime
        .send(Message::builder(qn("Mint.Ledger.AuditRole"), qn("Alice.Teller.TellerRole"), TASK_ACCOMPLISHED_INFO).build())
        .unwrap();

    let sent = mint.transport.take();
    assert_eq!(sent.len(), 3);
    assert!(!sent[0].is_signed(), "same-container messages travel unsigned");
    assert!(sent[1].is_signed(), "remote role signs cross-container messages");
    assert!(!sent[2].is_signed(), "roles without remote permission never sign");

    let certificate = keys.certificate_for(&qn("Mint.Ledger.LedgerRole")).unwrap();
    let provider = Ed25519CryptoProvider::new();
    provider
        .verify(&sent[1].signable_bytes().unwrap(), sent[1].signature().unwrap(), &certificate)
        .unwrap();
}

#[tokio::test]
async fn test_signature_covers_trace() {
    let keys = Arc::new(InMemoryKeyStore::new());
    let mint = harness(MINT, keys.clone());
    let alice = harness(ALICE, keys);
    let teller = qn("Alice.Teller.TellerRole");

    alice
        .runtime
        .dispatch(Message::builder(teller.clone(), teller.clone(), INITIALIZE_TASK).build())
        .await
        .unwrap();
    assert_eq!(
        alice.runtime.skill_state(&teller, "LedgerSkill"),
        Some(SkillState::IsolatedFromNetwork)
    );

    mint.runtime
        .send(
            Message::builder(qn("Mint.Ledger.LedgerRole"), teller.clone(), TASK_ACCOMPLISHED_INFO)
                .parameter(parameters::TRACE, "ledger closed")
                .build(),
        )
        .unwrap();
    let signed = mint.transport.take().remove(0);

    let outcome = alice.runtime.dispatch(signed.clone()).await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Delivered { .. }));

    let mut forged = serde_json::to_value(&signed).unwrap();
    forged["parameters"][parameters::TRACE]["value"] = serde_json::json!("ledger reopened");
    let forged: Message = serde_json::from_value(forged).unwrap();

    match alice.runtime.dispatch(forged).await.unwrap() {
        DispatchOutcome::NotPermitted { reason } => assert!(reason.contains("verification"), "{}", reason),
        other => panic!("forged trace accepted: {:?}", other),
    }
}

#[tokio::test]
async fn test_cross_container_rules_for_inbound_messages() {
    let keys = Arc::new(InMemoryKeyStore::new());
    let alice = harness(ALICE, keys);

    let unsigned = Message::builder(qn("Mint.Ledger.LedgerRole"), qn("Alice.Teller.TellerRole"), TASK_ACCOMPLISHED_INFO)
        .build();
    match alice.runtime.dispatch(unsigned).await.unwrap() {
        DispatchOutcome::NotPermitted { reason } => assert!(reason.contains("not signed")),
        other => panic!("unsigned message accepted: {:?}", other),
    }

    let to_local_only = Message::builder(qn("Mint.Ledger.LedgerRole"), qn("Alice.Teller.ClerkRole"), TASK_ACCOMPLISHED_INFO)
        .build();
    match alice.runtime.dispatch(to_local_only).await.unwrap() {
        DispatchOutcome::NotPermitted { reason } => assert!(reason.contains("other containers")),
        other => panic!("non-remote role accepted a remote message: {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_subskill_is_instantiated_once_under_contention() {
    let mint = harness(MINT, Arc::new(InMemoryKeyStore::new()));
    let role = mint
        .runtime
        .configuration()
        .role_by_qualified_name(&qn("Mint.Ledger.LedgerRole"))
        .unwrap();

    let instantiations = Arc::new(AtomicUsize::new(0));
    let subskills = Arc::new(factory(instantiations.clone()));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let role = role.clone();
        let subskills = subskills.clone();
        handles.push(tokio::spawn(async move {
            role.find_or_create_subskill("LedgerSkill", &subskills).unwrap()
        }));
    }

    let mut created = Vec::new();
    for handle in handles {
        created.push(handle.await.unwrap());
    }

    assert_eq!(instantiations.load(Ordering::SeqCst), 1);
    assert!(created.iter().all(|skill| Arc::ptr_eq(skill, &created[0])));
}

#[tokio::test]
async fn test_unknown_local_recipient_is_answered_locally() {
    let mint = harness(MINT, Arc::new(InMemoryKeyStore::new()));
    let message = Message::builder(qn("Mint.Ledger.AuditRole"), qn("Mint.Vault.VaultRole"), TASK_ACCOMPLISHED_INFO).build();
    assert!(mint.runtime.dispatch(message.clone()).await.is_err());

    let sent = mint.transport.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].operation(), MESSAGE_NOT_UNDERSTOOD_INFO);
    assert_eq!(sent[0].recipient_qualified_name(), &qn("Mint.Ledger.AuditRole"));
    assert_eq!(sent[0].message_parameter(), Some(&message));
    assert!(sent[0].trace().unwrap().contains("no such role"));
}

#[tokio::test]
async fn test_unknown_recipient_from_other_container_gets_no_reply() {
    let mint = harness(MINT, Arc::new(InMemoryKeyStore::new()));
    let message = Message::builder(qn("Alice.Teller.TellerRole"), qn("Mint.Vault.VaultRole"), TASK_ACCOMPLISHED_INFO).build();
    assert!(mint.runtime.dispatch(message).await.is_err());
    assert!(mint.transport.take().is_empty());
}

#[tokio::test]
async fn test_named_service_missing_from_role_is_not_understood() {
    let mint = harness(MINT, Arc::new(InMemoryKeyStore::new()));
    let message = Message::builder(qn("Mint.Ledger.AuditRole"), qn("Mint.Ledger.LedgerRole"), TASK_ACCOMPLISHED_INFO)
        .recipient_service("VaultSkill")
        .build();

    let outcome = mint.runtime.dispatch(message.clone()).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::NotUnderstood);

    let sent = mint.transport.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].operation(), MESSAGE_NOT_UNDERSTOOD_INFO);
    assert_eq!(sent[0].message_parameter(), Some(&message));
}

#[tokio::test]
async fn test_operation_fans_out_to_every_understanding_skill() {
    let mint = harness(MINT, Arc::new(InMemoryKeyStore::new()));
    let journal = qn("Mint.Journal.JournalRole");

    let outcome = mint
        .runtime
        .dispatch(Message::builder(journal.clone(), journal.clone(), INITIALIZE_TASK).build())
        .await
        .unwrap();
    match outcome {
        DispatchOutcome::Delivered { mut skills } => {
            skills.sort();
            assert_eq!(skills, vec!["JournalSkill".to_string(), "LedgerSkill".to_string()]);
        }
        other => panic!("expected fan-out delivery, got {:?}", other),
    }
    assert_eq!(mint.runtime.skill_state(&journal, "JournalSkill"), Some(SkillState::Ready));
    assert_eq!(mint.runtime.skill_state(&journal, "LedgerSkill"), Some(SkillState::Ready));
    assert!(mint.transport.take().is_empty());
}

#[tokio::test]
async fn test_role_refuses_to_send_for_another_sender() {
    let mint = harness(MINT, Arc::new(InMemoryKeyStore::new()));
    let ledger = mint.runtime.role(&qn("Mint.Ledger.LedgerRole")).unwrap();
    let services = mint.runtime.services().unwrap();

    let foreign = Message::builder(qn("Mint.Ledger.AuditRole"), qn("Mint.Journal.JournalRole"), TASK_ACCOMPLISHED_INFO)
        .build();
    match ledger.send_message(services.as_ref(), foreign) {
        Err(RoleError::NotSenderRole { role, sender }) => {
            assert_eq!(role, qn("Mint.Ledger.LedgerRole"));
            assert_eq!(sender, qn("Mint.Ledger.AuditRole"));
        }
        other => panic!("expected NotSenderRole, got {:?}", other),
    }
    assert!(mint.transport.take().is_empty());
}

#[tokio::test]
async fn test_rejected_reply_leaves_timeout_pending() {
    let keys = Arc::new(InMemoryKeyStore::new());
    let mint = harness(MINT, keys.clone());
    let alice = harness(ALICE, keys);
    let teller = qn("Alice.Teller.TellerRole");
    let ledger = qn("Mint.Ledger.LedgerRole");
    let services = alice.runtime.services().unwrap();

    let request = Message::builder(teller.clone(), ledger.clone(), JOIN_NETWORK_SINGLETON_AGENT_INFO).build();
    services
        .reply_timeouts()
        .register(&request, Duration::from_secs(30), false, None);
    alice.runtime.send(request.clone()).unwrap();

    // Unsigned answer claiming to come from elsewhere.
    let forged = Message::builder(qn("Evil.Evil.EvilRole"), teller.clone(), JOIN_ACKNOWLEDGED_TASK)
        .in_reply_to(request.reply_with())
        .build();
    let _ = alice.runtime.dispatch(forged).await;
    assert!(services.reply_timeouts().is_pending(request.reply_with()));

    // Unsigned answer from the right role is rejected too.
    let unsigned = Message::reply_to(&request, JOIN_ACKNOWLEDGED_TASK).build();
    let outcome = alice.runtime.dispatch(unsigned).await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::NotPermitted { .. }));
    assert!(services.reply_timeouts().is_pending(request.reply_with()));

    // The signed reply clears it.
    mint.runtime
        .send(Message::reply_to(&request, JOIN_ACKNOWLEDGED_TASK).build())
        .unwrap();
    let signed = mint.transport.take().remove(0);
    alice.runtime.dispatch(signed).await.unwrap();
    assert!(!services.reply_timeouts().is_pending(request.reply_with()));
}

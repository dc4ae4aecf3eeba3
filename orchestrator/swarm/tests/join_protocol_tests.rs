// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end join of a late container beneath a network singleton, over the
//! in-process network.

use agora_core::application::{build_container, start_container, NodeRuntime, RuntimeCollaborators};
use agora_core::domain::container_config::ContainerConfigManifest;
use agora_core::domain::context::ContainerServices;
use agora_core::domain::crypto::CertificateDirectory;
use agora_core::domain::events::RuntimeEvent;
use agora_core::domain::qualified_name::QualifiedName;
use agora_core::domain::skill::SkillState;
use agora_core::infrastructure::{Ed25519CryptoProvider, EventBus, InMemoryKeyStore, InProcessNetwork};
use agora_swarm::application::{skill_factory, NETWORK_JOIN_SKILL, NETWORK_SINGLETON_SKILL};
use agora_swarm::domain::{peer_credentials, PeerRelation, PEER_CREDENTIALS};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

const MINT: &str = r#"
apiVersion: agora.dev/v1
kind: ContainerConfig
metadata:
  name: mint
spec:
  container:
    name: Mint
    founding: true
  singleton_agent_hosts:
    hosts:
      Mint: Mint
  nodes:
    - name: MintAgent
      network_singleton: true
      roles:
        - name: MintRole
          skills: [NetworkSingletonSkill]
          remote_communications_permitted: true
          children: [Alice.AliceRole]
"#;

const ALICE: &str = r#"
apiVersion: agora.dev/v1
kind: ContainerConfig
metadata:
  name: alice
spec:
  container:
    name: Alice
  singleton_agent_hosts:
    hosts:
      Mint: Mint
  nodes:
    - name: AliceAgent
      roles:
        - name: AliceRole
          parent: Mint.MintRole
          skills: [NetworkJoinSkill]
          remote_communications_permitted: true
"#;

struct Network {
    network: Arc<InProcessNetwork>,
    keys: Arc<InMemoryKeyStore>,
    events: Arc<EventBus>,
}

impl Network {
    fn new() -> Self {
        Self {
            network: Arc::new(InProcessNetwork::new()),
            keys: Arc::new(InMemoryKeyStore::new()),
            events: Arc::new(EventBus::with_default_capacity()),
        }
    }

    fn container(&self, yaml: &str) -> Result<Arc<NodeRuntime>> {
        let manifest = ContainerConfigManifest::from_yaml_str(yaml)?;
        let runtime = build_container(
            &manifest,
            RuntimeCollaborators {
                skill_factory: Arc::new(skill_factory()),
                crypto: Arc::new(Ed25519CryptoProvider::new()),
                certificates: self.keys.clone(),
                credentials: self.keys.clone(),
                transport: self.network.clone(),
                events: self.events.clone(),
            },
        )?;
        self.network.attach(&runtime);
        Ok(runtime)
    }
}

fn qn(name: &str) -> QualifiedName {
    QualifiedName::parse(name).unwrap()
}

async fn wait_for_state(runtime: &NodeRuntime, role: &QualifiedName, skill: &str, state: SkillState) {
    for _ in 0..200 {
        if runtime.skill_state(role, skill) == Some(state) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "{} on {} stuck in {:?}, expected {:?}",
        skill,
        role,
        runtime.skill_state(role, skill),
        state
    );
}

#[tokio::test]
async fn test_late_container_joins_and_receives_mission() -> Result<()> {
    let net = Network::new();
    let mut events = net.events.subscribe();
    let mint_role = qn("Mint.Mint.MintRole");
    let alice_role = qn("Alice.Alice.AliceRole");

    let mint = net.container(MINT)?;
    start_container(&mint)?;
    wait_for_state(&mint, &mint_role, NETWORK_SINGLETON_SKILL, SkillState::Ready).await;

    let alice = net.container(ALICE)?;
    assert_eq!(alice.skill_state(&alice_role, NETWORK_JOIN_SKILL), Some(SkillState::Uninitialized));
    start_container(&alice)?;
    wait_for_state(&alice, &alice_role, NETWORK_JOIN_SKILL, SkillState::Ready).await;

    // Host side remembers the child's certificate.
    let host = mint.role(&mint_role).unwrap();
    let subskill = host.subskill(PEER_CREDENTIALS).expect("host records joined children");
    let children = peer_credentials(&subskill)?;
    assert_eq!(children.children(), vec![alice_role.clone()]);
    assert_eq!(
        children.certificate_for(&alice_role),
        net.keys.certificate_for(&alice_role)
    );

    // Joining side remembers its parent.
    let joined = alice.role(&alice_role).unwrap();
    let subskill = joined.subskill(PEER_CREDENTIALS).expect("child records its parent");
    let parent = peer_credentials(&subskill)?.peer(&mint_role).unwrap();
    assert_eq!(parent.relation, PeerRelation::Parent);
    assert_eq!(Some(parent.certificate), net.keys.certificate_for(&mint_role));

    let mut joined_event = None;
    while let Ok(event) = events.try_recv() {
        if let RuntimeEvent::RoleJoined { parent, child, .. } = event {
            joined_event = Some((parent, child));
        }
    }
    assert_eq!(joined_event, Some((mint_role, alice_role)));
    Ok(())
}

#[tokio::test]
async fn test_delegated_mission_reaches_every_role_of_the_container() -> Result<()> {
    let net = Network::new();
    let mint_role = qn("Mint.Mint.MintRole");
    let alice_role = qn("Alice.Alice.AliceRole");
    let book_role = qn("Alice.Book.BookRole");

    let mint = net.container(MINT)?;
    start_container(&mint)?;
    wait_for_state(&mint, &mint_role, NETWORK_SINGLETON_SKILL, SkillState::Ready).await;

    let with_books = format!(
        "{}    - name: BookAgent\n      roles:\n        - name: BookRole\n          skills: [NetworkJoinSkill]\n",
        ALICE
    );
    let alice = net.container(&with_books)?;
    start_container(&alice)?;

    wait_for_state(&alice, &alice_role, NETWORK_JOIN_SKILL, SkillState::Ready).await;
    wait_for_state(&alice, &book_role, NETWORK_JOIN_SKILL, SkillState::Ready).await;
    Ok(())
}

#[tokio::test]
async fn test_completed_join_leaves_no_open_conversations() -> Result<()> {
    let net = Network::new();
    let mint_role = qn("Mint.Mint.MintRole");
    let alice_role = qn("Alice.Alice.AliceRole");

    let mint = net.container(MINT)?;
    start_container(&mint)?;
    wait_for_state(&mint, &mint_role, NETWORK_SINGLETON_SKILL, SkillState::Ready).await;

    let alice = net.container(ALICE)?;
    start_container(&alice)?;
    wait_for_state(&alice, &alice_role, NETWORK_JOIN_SKILL, SkillState::Ready).await;

    let host = mint.services()?;
    for _ in 0..200 {
        if host.conversations().active_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(host.conversations().active_count(), 0);
    assert_eq!(alice.services()?.conversations().active_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_join_from_undeclared_child_is_refused() -> Result<()> {
    let net = Network::new();
    let mut events = net.events.subscribe();
    let mint_role = qn("Mint.Mint.MintRole");
    let bob_role = qn("Bob.Bob.BobRole");

    let mint = net.container(MINT)?;
    start_container(&mint)?;
    wait_for_state(&mint, &mint_role, NETWORK_SINGLETON_SKILL, SkillState::Ready).await;

    let bob = net.container(&ALICE.replace("Alice", "Bob").replace("alice", "bob"))?;
    start_container(&bob)?;

    let mut refusal = None;
    for _ in 0..200 {
        match events.try_recv() {
            Ok(RuntimeEvent::OperationNotPermitted { role, sender, .. }) if role == mint_role => {
                refusal = Some(sender);
                break;
            }
            Ok(_) => continue,
            Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    assert_eq!(refusal, Some(bob_role.clone()));

    // Bob stays isolated and the host recorded nobody.
    assert_eq!(bob.skill_state(&bob_role, NETWORK_JOIN_SKILL), Some(SkillState::IsolatedFromNetwork));
    let host = mint.role(&mint_role).unwrap();
    assert!(host.subskill(PEER_CREDENTIALS).is_none());
    Ok(())
}

#[tokio::test]
async fn test_founding_container_does_not_join() -> Result<()> {
    let net = Network::new();
    let founding_alice = ALICE.replace("    name: Alice\n", "    name: Alice\n    founding: true\n");
    let alice_role = qn("Alice.Alice.AliceRole");

    let alice = net.container(&founding_alice)?;
    start_container(&alice)?;
    wait_for_state(&alice, &alice_role, NETWORK_JOIN_SKILL, SkillState::Ready).await;

    let role = alice.role(&alice_role).unwrap();
    assert!(role.subskill(PEER_CREDENTIALS).is_none());
    Ok(())
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Container Bootstrap - Application Layer
//!
//! Turns a [`ContainerConfigManifest`] into a live [`NodeRuntime`]:
//!
//! 1. validate the manifest
//! 2. per node: create its roles, install declared skills from the
//!    [`SkillFactory`](crate::domain::skill_factory::SkillFactory), provision
//!    credentials for remote-capable roles
//! 3. bind roles into their node and add it to the runtime configuration
//! 4. load the singleton hosting table
//!
//! Building and starting are separate steps. [`start_container`] sends
//! `INITIALIZE_TASK` to every role, so it must run only after the transport
//! can deliver to the new roles.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::node_runtime::{MessagingSettings, NodeRuntime, RuntimeCollaborators};
use crate::domain::container_config::ContainerConfigManifest;
use crate::domain::node::{nickname_of, Node};
use crate::domain::role::Role;

/// Builds the runtime of the container described by `manifest`.
pub fn build_container(
    manifest: &ContainerConfigManifest,
    collaborators: RuntimeCollaborators,
) -> Result<Arc<NodeRuntime>> {
    manifest.validate().context("Invalid container configuration")?;

    let container = manifest.spec.container.name.as_str();
    let settings = MessagingSettings {
        reply_timeout: manifest.reply_timeout(),
        propagate_on_separate_tasks: manifest.spec.messaging.propagate_on_separate_tasks,
    };
    let factory = collaborators.skill_factory.clone();
    let credentials = collaborators.credentials.clone();

    let runtime = NodeRuntime::new(container, manifest.spec.container.founding, settings, collaborators);
    runtime.load_singleton_hosts(
        manifest
            .singleton_table()
            .context("Invalid singleton agent hosts")?,
    );

    for spec in &manifest.spec.nodes {
        let agent = nickname_of(&spec.name);
        let mut roles = Vec::with_capacity(spec.roles.len());

        for definition in &spec.roles {
            let role = Role::new(container, agent, definition.clone())
                .with_context(|| format!("Invalid role '{}' in node '{}'", definition.name, spec.name))?;

            let installed = role
                .install_declared_skills(&factory)
                .with_context(|| format!("Failed to install skills of {}", role.qualified_name()))?;

            if role.are_remote_communications_permitted() {
                let credential = credentials
                    .credential_for(role.qualified_name())
                    .with_context(|| format!("No credential for {}", role.qualified_name()))?;
                role.install_credential(credential)?;
            }

            debug!(
                role = %role.qualified_name(),
                skills = installed,
                remote = role.are_remote_communications_permitted(),
                "Role created"
            );
            roles.push(Arc::new(role));
        }

        let node = Node::new(container, spec.definition(), roles)
            .with_context(|| format!("Invalid node '{}'", spec.name))?;
        runtime.add_node(node)?;
    }

    info!(
        container = %container,
        founding = manifest.spec.container.founding,
        nodes = manifest.spec.nodes.len(),
        "Container built"
    );
    Ok(runtime)
}

/// Initializes every role of a built container.
pub fn start_container(runtime: &NodeRuntime) -> Result<usize> {
    let initialized = runtime
        .initialize_roles()
        .context("Failed to initialize roles")?;
    Ok(initialized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::SkillContext;
    use crate::domain::crypto::CertificateDirectory;
    use crate::domain::message::Message;
    use crate::domain::operations::INITIALIZE_TASK;
    use crate::domain::qualified_name::QualifiedName;
    use crate::domain::skill::{Skill, SkillError, SkillLifecycle, SkillState};
    use crate::domain::skill_factory::SkillFactory;
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::signing::{Ed25519CryptoProvider, InMemoryKeyStore};
    use crate::infrastructure::transport::InProcessNetwork;
    use async_trait::async_trait;
    use std::any::Any;
    use std::time::Duration;

    struct Ledger {
        lifecycle: SkillLifecycle,
    }

    #[async_trait]
    impl Skill for Ledger {
        fn class_name(&self) -> &str {
            "LedgerSkill"
        }

        fn understood_operations(&self) -> &[&'static str] {
            &[INITIALIZE_TASK]
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

    const MANIFEST: &str = r#"
apiVersion: agora.dev/v1
kind: ContainerConfig
metadata:
  name: bank
spec:
  container:
    name: Bank
    founding: true
  nodes:
    - name: LedgerAgent
      mission: keep the books
      roles:
        - name: LedgerRole
          skills: [LedgerSkill]
          remote_communications_permitted: true
        - name: AuditRole
          skills: [LedgerSkill]
"#;

    fn collaborators(network: Arc<InProcessNetwork>, keys: Arc<InMemoryKeyStore>) -> RuntimeCollaborators {
        let mut factory = SkillFactory::new();
        factory.register("LedgerSkill", || {
            Arc::new(Ledger {
                lifecycle: SkillLifecycle::new(),
            })
        });
        RuntimeCollaborators {
            skill_factory: Arc::new(factory),
            crypto: Arc::new(Ed25519CryptoProvider::new()),
            certificates: keys.clone(),
            credentials: keys,
            transport: network,
            events: Arc::new(EventBus::with_default_capacity()),
        }
    }

    #[test]
    fn test_build_creates_roles_and_credentials() {
        let manifest = ContainerConfigManifest::from_yaml_str(MANIFEST).unwrap();
        let keys = Arc::new(InMemoryKeyStore::new());
        let runtime = build_container(&manifest, collaborators(Arc::new(InProcessNetwork::new()), keys.clone())).unwrap();

        let mut roles: Vec<String> = runtime.local_roles().iter().map(|qn| qn.to_string()).collect();
        roles.sort();
        assert_eq!(roles, vec!["Bank.Ledger.AuditRole", "Bank.Ledger.LedgerRole"]);

        let ledger = QualifiedName::parse("Bank.Ledger.LedgerRole").unwrap();
        let audit = QualifiedName::parse("Bank.Ledger.AuditRole").unwrap();
        assert!(keys.certificate_for(&ledger).is_some());
        assert!(keys.certificate_for(&audit).is_none());
        assert_eq!(runtime.skill_state(&ledger, "LedgerSkill"), Some(SkillState::Uninitialized));
    }

    #[test]
    fn test_unknown_skill_class_fails_build() {
        let yaml = MANIFEST.replace("skills: [LedgerSkill]\n          remote", "skills: [MissingSkill]\n          remote");
        let manifest = ContainerConfigManifest::from_yaml_str(&yaml).unwrap();
        let result = build_container(
            &manifest,
            collaborators(Arc::new(InProcessNetwork::new()), Arc::new(InMemoryKeyStore::new())),
        );
        let err = result.err().unwrap();
        assert!(format!("{:#}", err).contains("MissingSkill"));
    }

    #[tokio::test]
    async fn test_start_makes_founding_skills_ready() {
        let manifest = ContainerConfigManifest::from_yaml_str(MANIFEST).unwrap();
        let network = Arc::new(InProcessNetwork::new());
        let runtime = build_container(&manifest, collaborators(network.clone(), Arc::new(InMemoryKeyStore::new()))).unwrap();
        network.attach(&runtime);

        assert_eq!(start_container(&runtime).unwrap(), 2);

        let ledger = QualifiedName::parse("Bank.Ledger.LedgerRole").unwrap();
        for _ in 0..50 {
            if runtime.skill_state(&ledger, "LedgerSkill") == Some(SkillState::Ready) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("LedgerSkill never became ready");
    }
}

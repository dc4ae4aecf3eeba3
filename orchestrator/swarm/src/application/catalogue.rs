// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Skill catalogue of this crate.

use agora_core::domain::skill_factory::SkillFactory;
use std::sync::Arc;

use crate::application::network_join::{NetworkJoinSkill, NETWORK_JOIN_SKILL};
use crate::application::network_singleton::{NetworkSingletonSkill, NETWORK_SINGLETON_SKILL};
use crate::domain::peer_credentials::{PeerCredentials, PEER_CREDENTIALS};

/// Registers the join protocol skills and their shared subskill.
pub fn register_skills(factory: &mut SkillFactory) -> &mut SkillFactory {
    factory
        .register(NETWORK_SINGLETON_SKILL, || Arc::new(NetworkSingletonSkill::new()))
        .register(NETWORK_JOIN_SKILL, || Arc::new(NetworkJoinSkill::new()))
        .register(PEER_CREDENTIALS, || Arc::new(PeerCredentials::new()))
}

/// A factory holding only this crate's skills.
pub fn skill_factory() -> SkillFactory {
    let mut factory = SkillFactory::new();
    register_skills(&mut factory);
    factory
}

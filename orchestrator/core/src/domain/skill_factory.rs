// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Skill class registry.
//!
//! Role definitions name their skills by class identifier. The factory maps
//! each identifier to a constructor registered at startup, so that the data
//! decides which behaviour a role carries without any runtime reflection.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::skill::Skill;

pub type SkillConstructor = Arc<dyn Fn() -> Arc<dyn Skill> + Send + Sync>;

#[derive(Clone, Default)]
pub struct SkillFactory {
    constructors: BTreeMap<String, SkillConstructor>,
}

impl SkillFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `class`, replacing any previous constructor under the same identifier.
    pub fn register<F>(&mut self, class: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn Skill> + Send + Sync + 'static,
    {
        self.constructors.insert(class.into(), Arc::new(constructor));
        self
    }

    pub fn contains(&self, class: &str) -> bool {
        self.constructors.contains_key(class)
    }

    pub fn constructor(&self, class: &str) -> Option<SkillConstructor> {
        self.constructors.get(class).cloned()
    }

    pub fn create(&self, class: &str) -> Option<Arc<dyn Skill>> {
        self.constructors.get(class).map(|constructor| constructor())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl fmt::Debug for SkillFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillFactory")
            .field("classes", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

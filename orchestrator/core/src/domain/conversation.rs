// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cross-message state for long-running conversations.
//!
//! A skill that must remember something between two messages of the same
//! exchange records it under `(node, role, skill class, conversation id)`.
//! Entries live until the conversation is concluded; nothing here expires on
//! its own.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::domain::node::NodeId;
use crate::domain::role::RoleId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub node: NodeId,
    pub role: RoleId,
    pub skill: String,
    pub conversation_id: Uuid,
}

impl ConversationKey {
    pub fn new(node: NodeId, role: RoleId, skill: impl Into<String>, conversation_id: Uuid) -> Self {
        Self {
            node,
            role,
            skill: skill.into(),
            conversation_id,
        }
    }
}

#[derive(Debug)]
pub struct ConversationStateInfo {
    key: ConversationKey,
    variables: Vec<(String, serde_json::Value)>,
    // built on first read, dropped on every append
    lookup: OnceLock<HashMap<String, usize>>,
}

impl ConversationStateInfo {
    pub fn new(key: ConversationKey) -> Self {
        Self {
            key,
            variables: Vec::new(),
            lookup: OnceLock::new(),
        }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Recorded pairs in insertion order.
    pub fn variables(&self) -> &[(String, serde_json::Value)] {
        &self.variables
    }

    pub fn append(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.variables.push((name.into(), value));
        self.lookup = OnceLock::new();
    }

    /// Latest value recorded under `name`.
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        let lookup = self.lookup.get_or_init(|| {
            self.variables
                .iter()
                .enumerate()
                .map(|(index, (name, _))| (name.clone(), index))
                .collect()
        });
        lookup.get(name).map(|&index| &self.variables[index].1)
    }
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: DashMap<ConversationKey, ConversationStateInfo>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a conversation. Returns `false` if it already existed.
    pub fn begin(&self, key: ConversationKey) -> bool {
        let mut created = false;
        self.conversations.entry(key.clone()).or_insert_with(|| {
            created = true;
            ConversationStateInfo::new(key)
        });
        created
    }

    /// Appends a variable, opening the conversation if needed.
    pub fn record(&self, key: &ConversationKey, name: impl Into<String>, value: serde_json::Value) {
        self.conversations
            .entry(key.clone())
            .or_insert_with(|| ConversationStateInfo::new(key.clone()))
            .append(name, value);
    }

    pub fn get_variable(&self, key: &ConversationKey, name: &str) -> Option<serde_json::Value> {
        self.conversations.get(key).and_then(|info| info.get(name).cloned())
    }

    pub fn contains(&self, key: &ConversationKey) -> bool {
        self.conversations.contains_key(key)
    }

    /// Ends the conversation and hands back what it held.
    pub fn conclude(&self, key: &ConversationKey) -> Option<ConversationStateInfo> {
        self.conversations.remove(key).map(|(_, info)| info)
    }

    pub fn active_count(&self) -> usize {
        self.conversations.len()
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Qualified Names
//!
//! Every role in the network is addressed by a dotted three-segment string
//! `container.agent.role`. Segment 0 names the hosting container, segment 1
//! the agent (node) and segment 2 the role. Role definitions that do not yet
//! know their container use the two-segment form `agent.role`
//! ([`AgentRoleName`]).
//!
//! The free functions in this module are the pure string operations used by
//! the router; the newtypes validate once on construction so the rest of the
//! crate can treat them as well-formed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QualifiedNameError {
    #[error("Malformed qualified name '{0}': expected container.agent.role")]
    Malformed(String),

    #[error("Malformed agent/role name '{0}': expected agent.role")]
    MalformedAgentRole(String),

    #[error("Invalid name segment '{0}'")]
    InvalidSegment(String),
}

/// A segment is non-empty and free of dots and whitespace.
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains('.') && !segment.chars().any(char::is_whitespace)
}

fn segments(qualified_name: &str) -> Result<[&str; 3], QualifiedNameError> {
    let mut parts = qualified_name.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(container), Some(agent), Some(role), None)
            if [container, agent, role].iter().all(|s| is_valid_segment(s)) =>
        {
            Ok([container, agent, role])
        }
        _ => Err(QualifiedNameError::Malformed(qualified_name.to_string())),
    }
}

/// Returns the container segment of `container.agent.role`.
pub fn extract_container_name(qualified_name: &str) -> Result<&str, QualifiedNameError> {
    segments(qualified_name).map(|s| s[0])
}

/// Returns the agent segment of `container.agent.role`.
pub fn extract_agent_name(qualified_name: &str) -> Result<&str, QualifiedNameError> {
    segments(qualified_name).map(|s| s[1])
}

/// Returns the role segment of `container.agent.role`.
pub fn extract_role_name(qualified_name: &str) -> Result<&str, QualifiedNameError> {
    segments(qualified_name).map(|s| s[2])
}

/// Returns `agent.role` from `container.agent.role`.
pub fn extract_agent_role_name(qualified_name: &str) -> Result<&str, QualifiedNameError> {
    let [container, _, _] = segments(qualified_name)?;
    Ok(&qualified_name[container.len() + 1..])
}

/// Fully resolved `container.agent.role` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedName(String);

impl QualifiedName {
    pub fn parse(value: &str) -> Result<Self, QualifiedNameError> {
        segments(value)?;
        Ok(Self(value.to_string()))
    }

    pub fn new(container: &str, agent: &str, role: &str) -> Result<Self, QualifiedNameError> {
        for segment in [container, agent, role] {
            if !is_valid_segment(segment) {
                return Err(QualifiedNameError::InvalidSegment(segment.to_string()));
            }
        }
        Ok(Self(format!("{}.{}.{}", container, agent, role)))
    }

    /// Places a container-less `agent.role` into `container`.
    pub fn with_container_of(container: &str, agent_role: &AgentRoleName) -> Result<Self, QualifiedNameError> {
        Self::new(container, agent_role.agent_name(), agent_role.role_name())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn parts(&self) -> [&str; 3] {
        let mut parts = self.0.splitn(3, '.');
        let container = parts.next().unwrap_or_default();
        let agent = parts.next().unwrap_or_default();
        let role = parts.next().unwrap_or_default();
        [container, agent, role]
    }

    pub fn container_name(&self) -> &str {
        self.parts()[0]
    }

    pub fn agent_name(&self) -> &str {
        self.parts()[1]
    }

    pub fn role_name(&self) -> &str {
        self.parts()[2]
    }

    pub fn agent_role_name(&self) -> AgentRoleName {
        let [_, agent, role] = self.parts();
        AgentRoleName(format!("{}.{}", agent, role))
    }

    /// Same agent and role, hosted by `container`. Only the container segment changes.
    pub fn with_container(&self, container: &str) -> Result<Self, QualifiedNameError> {
        let [_, agent, role] = self.parts();
        Self::new(container, agent, role)
    }

    pub fn is_same_container(&self, other: &QualifiedName) -> bool {
        self.container_name() == other.container_name()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for QualifiedName {
    type Err = QualifiedNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for QualifiedName {
    type Error = QualifiedNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        segments(&value)?;
        Ok(Self(value))
    }
}

impl From<QualifiedName> for String {
    fn from(value: QualifiedName) -> Self {
        value.0
    }
}

/// Container-independent `agent.role` address, as written in role definitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentRoleName(String);

impl AgentRoleName {
    pub fn parse(value: &str) -> Result<Self, QualifiedNameError> {
        match value.split_once('.') {
            Some((agent, role)) if is_valid_segment(agent) && is_valid_segment(role) => {
                Ok(Self(value.to_string()))
            }
            _ => Err(QualifiedNameError::MalformedAgentRole(value.to_string())),
        }
    }

    pub fn new(agent: &str, role: &str) -> Result<Self, QualifiedNameError> {
        Self::parse(&format!("{}.{}", agent, role))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn agent_name(&self) -> &str {
        self.0.split_once('.').map(|(agent, _)| agent).unwrap_or_default()
    }

    pub fn role_name(&self) -> &str {
        self.0.split_once('.').map(|(_, role)| role).unwrap_or_default()
    }
}

impl fmt::Display for AgentRoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AgentRoleName {
    type Err = QualifiedNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AgentRoleName {
    type Error = QualifiedNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AgentRoleName> for String {
    fn from(value: AgentRoleName) -> Self {
        value.0
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Message Value Object
//!
//! The only way roles communicate. A [`Message`] is built once through
//! [`MessageBuilder`] and is read-only afterwards: skills receive `&Message`
//! and answer by building new messages.
//!
//! ## Signature Lifecycle
//!
//! ```text
//! MessageBuilder::build()        (unsigned)
//!   └─ Role::send_message()       may re-address a network singleton recipient
//!        └─ Message::with_signature()   exactly once, only when crossing containers
//!             └─ MessageTransport::deliver()
//! ```
//!
//! The signed bytes are the canonical JSON of every field except the
//! signature. Parameters live in a `BTreeMap` so that encoding is stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::crypto::Certificate;
use crate::domain::operations::parameters;
use crate::domain::qualified_name::QualifiedName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("Message {0} is already signed")]
    AlreadySigned(Uuid),

    #[error("Failed to encode message for signing: {0}")]
    Encoding(String),
}

/// Closed set of values a message parameter may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
    TextList(Vec<String>),
    Certificate(Certificate),
    Message(Box<Message>),
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Uuid> for ParameterValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<Certificate> for ParameterValue {
    fn from(value: Certificate) -> Self {
        Self::Certificate(value)
    }
}

impl From<Message> for ParameterValue {
    fn from(value: Message) -> Self {
        Self::Message(Box::new(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    sender_qualified_name: QualifiedName,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender_service: Option<String>,
    recipient_qualified_name: QualifiedName,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient_service: Option<String>,
    conversation_id: Uuid,
    reply_with: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_reply_to: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_by_deadline: Option<DateTime<Utc>>,
    operation: String,
    #[serde(default)]
    parameters: BTreeMap<String, ParameterValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<Vec<u8>>,
}

/// Borrowed view of everything covered by the signature.
#[derive(Serialize)]
struct SignableView<'a> {
    sender_qualified_name: &'a QualifiedName,
    sender_service: &'a Option<String>,
    recipient_qualified_name: &'a QualifiedName,
    recipient_service: &'a Option<String>,
    conversation_id: &'a Uuid,
    reply_with: &'a Uuid,
    in_reply_to: &'a Option<Uuid>,
    reply_by_deadline: &'a Option<DateTime<Utc>>,
    operation: &'a str,
    parameters: &'a BTreeMap<String, ParameterValue>,
}

impl Message {
    pub fn builder(
        sender: QualifiedName,
        recipient: QualifiedName,
        operation: impl Into<String>,
    ) -> MessageBuilder {
        MessageBuilder::new(sender, recipient, operation.into())
    }

    /// Starts a reply: sender and recipient (and their services) swap, the
    /// conversation carries over and `in_reply_to` correlates with the
    /// original's `reply_with`.
    pub fn reply_to(original: &Message, operation: impl Into<String>) -> MessageBuilder {
        let mut builder = MessageBuilder::new(
            original.recipient_qualified_name.clone(),
            original.sender_qualified_name.clone(),
            operation.into(),
        );
        builder.sender_service = original.recipient_service.clone();
        builder.recipient_service = original.sender_service.clone();
        builder.conversation_id = original.conversation_id;
        builder.in_reply_to = Some(original.reply_with);
        builder
    }

    pub fn sender_qualified_name(&self) -> &QualifiedName {
        &self.sender_qualified_name
    }

    pub fn sender_service(&self) -> Option<&str> {
        self.sender_service.as_deref()
    }

    pub fn recipient_qualified_name(&self) -> &QualifiedName {
        &self.recipient_qualified_name
    }

    pub fn recipient_service(&self) -> Option<&str> {
        self.recipient_service.as_deref()
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn reply_with(&self) -> Uuid {
        self.reply_with
    }

    pub fn in_reply_to(&self) -> Option<Uuid> {
        self.in_reply_to
    }

    pub fn reply_by_deadline(&self) -> Option<DateTime<Utc>> {
        self.reply_by_deadline
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParameterValue> {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name)
    }

    pub fn text_parameter(&self, name: &str) -> Option<&str> {
        match self.parameters.get(name) {
            Some(ParameterValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn certificate_parameter(&self) -> Option<&Certificate> {
        match self.parameters.get(parameters::CERTIFICATE) {
            Some(ParameterValue::Certificate(certificate)) => Some(certificate),
            _ => None,
        }
    }

    pub fn message_parameter(&self) -> Option<&Message> {
        match self.parameters.get(parameters::MESSAGE) {
            Some(ParameterValue::Message(message)) => Some(message),
            _ => None,
        }
    }

    /// Diagnostic trace accumulated over previous hops.
    pub fn trace(&self) -> Option<&str> {
        self.text_parameter(parameters::TRACE)
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// True when sender and recipient live in different containers.
    pub fn crosses_containers(&self) -> bool {
        !self.sender_qualified_name.is_same_container(&self.recipient_qualified_name)
    }

    /// Canonical bytes covered by the signature.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, MessageError> {
        let view = SignableView {
            sender_qualified_name: &self.sender_qualified_name,
            sender_service: &self.sender_service,
            recipient_qualified_name: &self.recipient_qualified_name,
            recipient_service: &self.recipient_service,
            conversation_id: &self.conversation_id,
            reply_with: &self.reply_with,
            in_reply_to: &self.in_reply_to,
            reply_by_deadline: &self.reply_by_deadline,
            operation: &self.operation,
            parameters: &self.parameters,
        };
        serde_json::to_vec(&view).map_err(|e| MessageError::Encoding(e.to_string()))
    }

    /// Attaches the signature. A message is signed at most once.
    pub fn with_signature(mut self, signature: Vec<u8>) -> Result<Self, MessageError> {
        if self.signature.is_some() {
            return Err(MessageError::AlreadySigned(self.reply_with));
        }
        self.signature = Some(signature);
        Ok(self)
    }

    /// Re-addresses an unsigned message that has not yet been sent.
    pub(crate) fn readdressed(mut self, recipient: QualifiedName) -> Result<Self, MessageError> {
        if self.signature.is_some() {
            return Err(MessageError::AlreadySigned(self.reply_with));
        }
        self.recipient_qualified_name = recipient;
        Ok(self)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} -> {}",
            self.operation, self.sender_qualified_name, self.recipient_qualified_name
        )?;
        if let Some(service) = &self.recipient_service {
            write!(f, " ({})", service)?;
        }
        write!(f, "]")
    }
}

/// Builder for [`Message`]; the only constructor.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    sender_qualified_name: QualifiedName,
    sender_service: Option<String>,
    recipient_qualified_name: QualifiedName,
    recipient_service: Option<String>,
    conversation_id: Uuid,
    reply_with: Uuid,
    in_reply_to: Option<Uuid>,
    reply_by_deadline: Option<DateTime<Utc>>,
    operation: String,
    parameters: BTreeMap<String, ParameterValue>,
}

impl MessageBuilder {
    fn new(sender: QualifiedName, recipient: QualifiedName, operation: String) -> Self {
        Self {
            sender_qualified_name: sender,
            sender_service: None,
            recipient_qualified_name: recipient,
            recipient_service: None,
            conversation_id: Uuid::new_v4(),
            reply_with: Uuid::new_v4(),
            in_reply_to: None,
            reply_by_deadline: None,
            operation,
            parameters: BTreeMap::new(),
        }
    }

    pub fn sender_service(mut self, service: impl Into<String>) -> Self {
        self.sender_service = Some(service.into());
        self
    }

    pub fn recipient_service(mut self, service: impl Into<String>) -> Self {
        self.recipient_service = Some(service.into());
        self
    }

    pub fn maybe_recipient_service(mut self, service: Option<String>) -> Self {
        self.recipient_service = service;
        self
    }

    pub fn conversation_id(mut self, conversation_id: Uuid) -> Self {
        self.conversation_id = conversation_id;
        self
    }

    pub fn reply_with(mut self, reply_with: Uuid) -> Self {
        self.reply_with = reply_with;
        self
    }

    pub fn in_reply_to(mut self, in_reply_to: Uuid) -> Self {
        self.in_reply_to = Some(in_reply_to);
        self
    }

    pub fn reply_by(mut self, deadline: DateTime<Utc>) -> Self {
        self.reply_by_deadline = Some(deadline);
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Message {
        Message {
            sender_qualified_name: self.sender_qualified_name,
            sender_service: self.sender_service,
            recipient_qualified_name: self.recipient_qualified_name,
            recipient_service: self.recipient_service,
            conversation_id: self.conversation_id,
            reply_with: self.reply_with,
            in_reply_to: self.in_reply_to,
            reply_by_deadline: self.reply_by_deadline,
            operation: self.operation,
            parameters: self.parameters,
            signature: None,
        }
    }
}

/// Appends one hop summary to a prior trace. Traces are never truncated.
pub fn extend_trace(prior: Option<&str>, hop: &str) -> String {
    match prior {
        Some(prior) if !prior.is_empty() => format!("{}\n{}", prior, hop),
        _ => hop.to_string(),
    }
}

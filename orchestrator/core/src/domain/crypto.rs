// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Crypto Collaborator Contracts
//!
//! The runtime never generates key material. It consumes:
//!
//! - [`CryptoProvider`]: `sign` with a private key, `verify` against a certificate.
//! - [`CertificateDirectory`]: the `certificate_for(role)` lookup.
//! - [`CredentialSource`]: hands a remote-capable role its credential.
//!
//! Keeping these as traits holds `ed25519-dalek` out of the domain layer; the
//! concrete implementation lives in [`crate::infrastructure::signing`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::qualified_name::QualifiedName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signature verification failed: {0}")]
    VerificationFailed(String),
}

/// Public half of a role's credential. Travels inside join messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Certificate {
    /// The role this certificate speaks for.
    pub subject: QualifiedName,
    /// Raw public key bytes (32 bytes for Ed25519).
    pub public_key: Vec<u8>,
}

/// Runtime-only signing credential cached by remote-capable roles.
///
/// Never persisted. `Debug` redacts the private key.
#[derive(Clone)]
pub struct RoleCredential {
    certificate: Certificate,
    private_key: Vec<u8>,
}

impl RoleCredential {
    pub fn new(certificate: Certificate, private_key: Vec<u8>) -> Self {
        Self {
            certificate,
            private_key,
        }
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }
}

impl fmt::Debug for RoleCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleCredential")
            .field("certificate", &self.certificate)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Signing and verification capability.
///
/// Implementations **must** verify in constant time.
pub trait CryptoProvider: Send + Sync {
    fn sign(&self, bytes: &[u8], credential: &RoleCredential) -> Result<Vec<u8>, CryptoError>;

    fn verify(&self, bytes: &[u8], signature: &[u8], certificate: &Certificate) -> Result<(), CryptoError>;
}

/// Lookup of the certificate currently associated with a role.
pub trait CertificateDirectory: Send + Sync {
    fn certificate_for(&self, role: &QualifiedName) -> Option<Certificate>;
}

/// Where remote-capable roles obtain their signing credential at startup.
pub trait CredentialSource: Send + Sync {
    fn credential_for(&self, role: &QualifiedName) -> Result<RoleCredential, CryptoError>;
}

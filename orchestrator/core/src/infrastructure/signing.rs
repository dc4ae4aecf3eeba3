// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Ed25519 message signing and an in-memory key store.
//!
//! [`Ed25519CryptoProvider`] signs the canonical bytes of a message and
//! verifies with `verify_strict`, which rejects weak keys and malleable
//! signatures. [`InMemoryKeyStore`] generates one key pair per role on first
//! request and answers certificate lookups for the whole process, which is
//! all the PKI an in-process network needs.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use dashmap::DashMap;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand_core::OsRng;
use tracing::{debug, info};

use crate::domain::crypto::{
    Certificate, CertificateDirectory, CredentialSource, CryptoError, CryptoProvider, RoleCredential,
};
use crate::domain::qualified_name::QualifiedName;

#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519CryptoProvider;

impl Ed25519CryptoProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for Ed25519CryptoProvider {
    fn sign(&self, bytes: &[u8], credential: &RoleCredential) -> Result<Vec<u8>, CryptoError> {
        let secret: [u8; 32] = credential.private_key().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "Private key of {} must be 32 bytes",
                credential.certificate().subject
            ))
        })?;
        let signing_key = SigningKey::from_bytes(&secret);
        Ok(signing_key.sign(bytes).to_bytes().to_vec())
    }

    fn verify(&self, bytes: &[u8], signature: &[u8], certificate: &Certificate) -> Result<(), CryptoError> {
        let public: [u8; 32] = certificate.public_key.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey("Invalid public key length (must be 32 bytes)".to_string())
        })?;
        let verifying_key = VerifyingKey::from_bytes(&public)
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid public key: {}", e)))?;

        let signature = Signature::from_slice(signature)
            .map_err(|_| CryptoError::InvalidSignature("Invalid signature length (must be 64 bytes)".to_string()))?;

        verifying_key
            .verify_strict(bytes, &signature)
            .map_err(|e| CryptoError::VerificationFailed(format!("{} ({})", certificate.subject, e)))
    }
}

/// Process-wide key material, keyed by role.
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: DashMap<QualifiedName, SigningKey>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base64 of the role's public key, for logs and operator output.
    pub fn fingerprint(&self, role: &QualifiedName) -> Option<String> {
        self.keys
            .get(role)
            .map(|key| STANDARD.encode(key.verifying_key().as_bytes()))
    }

    /// Forgets a role's key pair. The next credential request generates a new one.
    pub fn revoke(&self, role: &QualifiedName) -> bool {
        let revoked = self.keys.remove(role).is_some();
        if revoked {
            info!(role = %role, "Role key revoked");
        }
        revoked
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn certificate(role: &QualifiedName, key: &SigningKey) -> Certificate {
        Certificate {
            subject: role.clone(),
            public_key: key.verifying_key().as_bytes().to_vec(),
        }
    }
}

impl CredentialSource for InMemoryKeyStore {
    fn credential_for(&self, role: &QualifiedName) -> Result<RoleCredential, CryptoError> {
        let key = self
            .keys
            .entry(role.clone())
            .or_insert_with(|| {
                let key = SigningKey::generate(&mut OsRng);
                debug!(
                    role = %role,
                    public_key = %STANDARD.encode(key.verifying_key().as_bytes()),
                    "Generated role key pair"
                );
                key
            })
            .clone();
        Ok(RoleCredential::new(Self::certificate(role, &key), key.to_bytes().to_vec()))
    }
}

impl CertificateDirectory for InMemoryKeyStore {
    fn certificate_for(&self, role: &QualifiedName) -> Option<Certificate> {
        self.keys.get(role).map(|key| Self::certificate(role, &key))
    }
}

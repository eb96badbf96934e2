// src/wallet/key_management.rs
//! Nonce signing for device pairing.
//!
//! The device proves a client's identity with a challenge: it hands out a
//! one-time nonce and expects it back signed with RSASSA-PKCS1-v1_5 over
//! SHA-256, base64-encoded.

use crate::error::KeyError;
use crate::models::credential::Credential;
use ring::rand::SystemRandom;
use ring::signature::{RsaKeyPair, RSA_PKCS1_SHA256};
use std::sync::Arc;

/// RSA signer built from a credential's normalized key.
///
/// Cheap to clone; the parsed key pair is shared.
#[derive(Clone)]
pub struct NonceSigner {
    key_pair: Arc<RsaKeyPair>,
    rng: SystemRandom,
}

impl NonceSigner {
    /// Parses the credential's PKCS#8 key.
    ///
    /// # Errors
    /// Returns [`KeyError::Rejected`] if the key is not a usable RSA key.
    pub fn new(credential: &Credential) -> Result<Self, KeyError> {
        Self::from_pkcs8(credential.private_key_der())
    }

    pub fn from_pkcs8(der: &[u8]) -> Result<Self, KeyError> {
        let key_pair =
            RsaKeyPair::from_pkcs8(der).map_err(|e| KeyError::Rejected(e.to_string()))?;
        Ok(Self {
            key_pair: Arc::new(key_pair),
            rng: SystemRandom::new(),
        })
    }

    /// Signs the UTF-8 bytes of `nonce`.
    ///
    /// # Returns
    /// Raw signature bytes, one modulus long.
    pub fn sign(&self, nonce: &str) -> Result<Vec<u8>, KeyError> {
        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(&RSA_PKCS1_SHA256, &self.rng, nonce.as_bytes(), &mut signature)
            .map_err(|_| KeyError::Rejected("signing failed".to_string()))?;
        Ok(signature)
    }

    /// Signs `nonce` and base64-encodes the result, the form `PUT /auth` expects.
    pub fn sign_nonce(&self, nonce: &str) -> Result<String, KeyError> {
        self.sign(nonce).map(base64::encode)
    }
}

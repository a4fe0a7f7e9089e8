//! Server-to-server static channel.
//!
//! Cooperating hosts share a passphrase-derived box keypair and each
//! other's public keys out of band - configuration, not negotiation.
//! Envelopes carry the sender's name; the receiver looks the sender's
//! key up by name and rejects anyone it does not know. That lookup is
//! the entire access control.

use std::collections::HashMap;

use serde_json::Value;

use crate::channel::{decrypt_payload, encrypt_payload};
use crate::crypto::{derive_box_keypair, BoxKeypair, BoxPublicKey};
use crate::error::{Result, SoAuthError};
use crate::wire::S2sEnvelope;

/// One side of an S2S clique.
pub struct S2sChannel {
    name: String,
    keypair: BoxKeypair,
    peers: HashMap<String, BoxPublicKey>,
}

impl S2sChannel {
    /// Derive this host's S2S identity from its passphrase.
    ///
    /// Deterministic (`derive_box_keypair(passphrase, "")`), so the
    /// public key printed at startup never changes for a passphrase.
    pub fn new(name: impl Into<String>, passphrase: &str) -> Self {
        Self {
            name: name.into(),
            keypair: derive_box_keypair(passphrase.as_bytes(), b""),
            peers: HashMap::new(),
        }
    }

    /// Register a peer's public key under its name.
    pub fn with_peer(mut self, name: impl Into<String>, public_key: &str) -> Result<Self> {
        self.peers.insert(name.into(), BoxPublicKey::from_hex(public_key)?);
        Ok(self)
    }

    /// This host's name on the clique
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This host's S2S public key (hex), for out-of-band distribution
    pub fn public_key(&self) -> String {
        self.keypair.public_key().to_hex()
    }

    /// Encrypt a payload to a named peer.
    pub fn encrypt_to(&self, peer: &str, payload: &Value) -> Result<S2sEnvelope> {
        let peer_key = self
            .peers
            .get(peer)
            .ok_or_else(|| SoAuthError::UnknownHost(peer.to_string()))?;

        Ok(S2sEnvelope {
            name: self.name.clone(),
            data: encrypt_payload(payload, &self.keypair, peer_key)?,
        })
    }

    /// Open an envelope, authenticating the sender by its registered key.
    pub fn open(&self, envelope: &S2sEnvelope) -> Result<Value> {
        let peer_key = self
            .peers
            .get(&envelope.name)
            .ok_or_else(|| SoAuthError::UnknownHost(envelope.name.clone()))?;

        decrypt_payload(&envelope.data, &self.keypair, peer_key)
    }
}

impl std::fmt::Debug for S2sChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S2sChannel")
            .field("name", &self.name)
            .field("peers", &self.peers.keys().collect::<Vec<_>>())
            .finish()
    }
}

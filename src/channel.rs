//! Session Channel: encrypted payload envelopes between two box keys.
//!
//! Both directions of every SoAuth exchange - client/host sessions, S2S,
//! machine channels - move through these two functions. A payload is
//! serialized ([`crate::wire::serialize_payload`]), boxed under a fresh
//! nonce, and shipped as `{ciphertext, nonce}` hex. Decryption is the
//! mirror image with best-effort JSON recovery; any tampering with
//! ciphertext or nonce surfaces as the distinguished
//! [`SoAuthError::DecryptionFailed`], never as corrupted plaintext.
//!
//! The channel is deliberately stateless: callers hand in whichever
//! keypair applies to this request. On the host that keypair is rederived
//! from `(master secret, slot.lastModified)` before every call, which is
//! what makes request handling share-nothing.

use serde_json::Value;

use crate::crypto::{
    box_decrypt, box_encrypt, generate_nonce, BoxKeypair, BoxPublicKey, BOX_NONCE_BYTES,
};
use crate::error::{Result, SoAuthError};
use crate::wire::{parse_payload, serialize_payload, CipherEnvelope};

/// Encrypt a payload from `keypair` to `peer`.
pub fn encrypt_payload(
    payload: &Value,
    keypair: &BoxKeypair,
    peer: &BoxPublicKey,
) -> Result<CipherEnvelope> {
    let plaintext = serialize_payload(payload)?;
    let nonce = generate_nonce();
    let ciphertext = box_encrypt(plaintext.as_bytes(), &nonce, peer, keypair)?;

    Ok(CipherEnvelope {
        ciphertext: hex::encode(ciphertext),
        nonce: hex::encode(nonce),
    })
}

/// Decrypt an envelope from `peer`.
pub fn decrypt_payload(
    envelope: &CipherEnvelope,
    keypair: &BoxKeypair,
    peer: &BoxPublicKey,
) -> Result<Value> {
    let ciphertext = hex::decode(&envelope.ciphertext)
        .map_err(|_| SoAuthError::InvalidMessageFormat("ciphertext is not valid hex".to_string()))?;
    let nonce_bytes = hex::decode(&envelope.nonce)
        .map_err(|_| SoAuthError::InvalidMessageFormat("nonce is not valid hex".to_string()))?;
    let nonce: [u8; BOX_NONCE_BYTES] = nonce_bytes.try_into().map_err(|_| {
        SoAuthError::InvalidMessageFormat(format!("nonce must be {BOX_NONCE_BYTES} bytes"))
    })?;

    let plaintext = box_decrypt(&ciphertext, &nonce, peer, keypair)?;
    let text = String::from_utf8(plaintext).map_err(|_| SoAuthError::DecryptionFailed)?;

    Ok(parse_payload(text))
}

/// A handshake-free channel over fixed keys.
///
/// Used wherever both keys are known out of band: the S2S clique and the
/// machine channel. No negotiation, no stored state beyond the keys.
pub struct StaticChannel {
    keypair: BoxKeypair,
    peer: BoxPublicKey,
}

impl StaticChannel {
    /// Build a channel from our keypair and the peer's public key
    pub fn new(keypair: BoxKeypair, peer: BoxPublicKey) -> Self {
        Self { keypair, peer }
    }

    /// Our public key, for out-of-band distribution
    pub fn public_key(&self) -> &BoxPublicKey {
        self.keypair.public_key()
    }

    /// Encrypt a payload to the peer
    pub fn encrypt(&self, payload: &Value) -> Result<CipherEnvelope> {
        encrypt_payload(payload, &self.keypair, &self.peer)
    }

    /// Decrypt an envelope from the peer
    pub fn decrypt(&self, envelope: &CipherEnvelope) -> Result<Value> {
        decrypt_payload(envelope, &self.keypair, &self.peer)
    }
}

impl std::fmt::Debug for StaticChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticChannel")
            .field("public", self.keypair.public_key())
            .field("peer", &self.peer)
            .finish()
    }
}

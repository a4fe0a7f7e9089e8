//! Machine client: deterministic identity, no negotiation.
//!
//! A process derives its box keypair from `(secret, hostId)` - fully
//! deterministic, so the public key can be registered with the host once,
//! out of band. The host's machine-facing public key is configured the
//! same way. After that, every exchange is a static box; the fingerprint
//! header tells the host which peer is talking.

use serde_json::Value;

use crate::channel::StaticChannel;
use crate::crypto::{derive_box_keypair, BoxPublicKey};
use crate::error::Result;
use crate::fingerprint::device_fingerprint;
use crate::wire::CipherEnvelope;

/// Handshake-free machine client.
pub struct MachineClient {
    host_id: String,
    channel: StaticChannel,
}

impl MachineClient {
    /// Derive the machine identity and bind it to the host's public key.
    pub fn new(secret: &[u8], host_id: &str, host_public_key: &str) -> Result<Self> {
        let keypair = derive_box_keypair(secret, host_id.as_bytes());
        let peer = BoxPublicKey::from_hex(host_public_key)?;

        Ok(Self {
            host_id: host_id.to_string(),
            channel: StaticChannel::new(keypair, peer),
        })
    }

    /// The host id this client talks to
    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    /// This machine's box public key (hex), for out-of-band registration
    pub fn public_key(&self) -> String {
        self.channel.public_key().to_hex()
    }

    /// This process's fingerprint, sent as the `SoAuth-Fingerprint`
    /// header so the host can select the right peer.
    pub fn fingerprint() -> String {
        device_fingerprint()
    }

    /// Encrypt a payload to the host
    pub fn encrypt(&self, payload: &Value) -> Result<CipherEnvelope> {
        self.channel.encrypt(payload)
    }

    /// Decrypt an envelope from the host
    pub fn decrypt(&self, envelope: &CipherEnvelope) -> Result<Value> {
        self.channel.decrypt(envelope)
    }
}

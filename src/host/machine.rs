//! Machine-peer registry: handshake-free channels for processes.
//!
//! Machine clients never negotiate. Their box public key is registered
//! out of band, keyed by fingerprint, and the host rederives its own side
//! of the channel per peer from the master secret - the keyless-server
//! property holds here too. The fingerprint header on a machine request
//! selects the peer.

use std::collections::HashMap;

use crate::channel::StaticChannel;
use crate::crypto::{derive_box_keypair, BoxPublicKey, MasterSecret};
use crate::error::{Result, SoAuthError};

/// A registered machine peer.
#[derive(Debug, Clone)]
pub struct MachinePeer {
    /// Served host id the peer talks to
    pub host_id: String,
    /// Peer's deterministic box public key (hex)
    pub public_key: String,
}

/// Registry of machine peers, keyed by fingerprint.
#[derive(Debug, Default)]
pub struct MachineRegistry {
    peers: HashMap<String, MachinePeer>,
}

impl MachineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer. The public key must be a valid hex box key.
    pub fn register(
        &mut self,
        fingerprint: impl Into<String>,
        host_id: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Result<()> {
        let public_key = public_key.into();
        BoxPublicKey::from_hex(&public_key)?;

        self.peers.insert(
            fingerprint.into(),
            MachinePeer {
                host_id: host_id.into(),
                public_key,
            },
        );
        Ok(())
    }

    /// Number of registered peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peers are registered
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Build the host-side channel for the peer behind `fingerprint`.
    ///
    /// The host keypair derives from
    /// `(master, hostId ‖ peerPublicKeyHex)`, so each peer sees a
    /// distinct host key and nothing is stored.
    pub fn channel_for(&self, master: &MasterSecret, fingerprint: &str) -> Result<StaticChannel> {
        let peer = self
            .peers
            .get(fingerprint)
            .ok_or(SoAuthError::TokenNotFound)?;

        let context = format!("{}{}", peer.host_id, peer.public_key);
        let keypair = derive_box_keypair(master.as_bytes(), context.as_bytes());
        let peer_public = BoxPublicKey::from_hex(&peer.public_key)?;

        Ok(StaticChannel::new(keypair, peer_public))
    }

    /// The host-side box public key for a peer, for out-of-band
    /// distribution to the machine.
    pub fn host_public_key(&self, master: &MasterSecret, fingerprint: &str) -> Result<String> {
        Ok(self.channel_for(master, fingerprint)?.public_key().to_hex())
    }
}

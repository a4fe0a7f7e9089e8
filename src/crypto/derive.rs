//! Key Derivation Engine.
//!
//! Every asymmetric key in SoAuth comes out of this module, derived from a
//! secret plus contextual salts. Identical inputs always give identical
//! keypairs - this is what lets a host serve sessions without storing a
//! single private key: the box keypair for a session is rederivable from
//! the master secret and the record's `lastModified` salt at any time, on
//! any process.
//!
//! Two derivation shapes exist on purpose:
//!
//! - [`derive_sign_keypair`] / [`derive_box_keypair`] are pure: stable
//!   identity keys.
//! - [`derive_session_box_keypair`] mixes caller-supplied nonce material
//!   (fresh randomness on the client, a stored timestamp on the host) and
//!   returns the seed alongside, so the caller can persist and rederive.
//!
//! Keeping these as separate functions prevents a session key from being
//! mistaken for a stable identity key.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::box_::{BoxKeypair, BOX_SEED_BYTES};
use super::hash;
use super::sign::SignKeypair;

/// Host-held root secret. Never transmitted, never stored derived.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret(Vec<u8>);

impl MasterSecret {
    /// Wrap raw secret bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The secret bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for MasterSecret {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterSecret([REDACTED, {} bytes])", self.0.len())
    }
}

/// Derive a deterministic signing keypair from `(secret, context)`.
///
/// `seed = H_max(secret ‖ context)`, `signSeed = H_seed(seed)`.
pub fn derive_sign_keypair(secret: &[u8], context: &[u8]) -> SignKeypair {
    let seed = hash::digest_max(&[secret, context]);
    SignKeypair::from_seed(hash::digest_seed(&[&seed]))
}

/// Derive a deterministic box keypair from `(secret, context)`.
///
/// Same shape as [`derive_sign_keypair`], targeting the box seed width.
pub fn derive_box_keypair(secret: &[u8], context: &[u8]) -> BoxKeypair {
    let seed = hash::digest_max(&[secret, context]);
    BoxKeypair::from_seed(hash::digest_seed(&[&seed]))
}

/// Derive a session-scoped box keypair.
///
/// `boxSeed = H_seed(H_max(secret ‖ context) ‖ nonce_material)`. With fresh
/// random nonce material the output is unique per negotiation; with a
/// stored salt it is rederivable. The seed is returned so the caller can
/// cache it ([`BoxKeypair::from_seed`] rebuilds the keypair).
pub fn derive_session_box_keypair(
    secret: &[u8],
    context: &[u8],
    nonce_material: &[u8],
) -> (BoxKeypair, [u8; BOX_SEED_BYTES]) {
    let seed = hash::digest_max(&[secret, context]);
    let box_seed = hash::digest_seed(&[&seed, nonce_material]);
    (BoxKeypair::from_seed(box_seed), box_seed)
}

/// Rederive the host-side session box keypair for a record slot.
///
/// `boxSeed = H_seed(H_max(master) ‖ decimal-millis(lastModified))`. Called
/// on every request; the keypair never outlives the request.
pub fn host_session_box_keypair(master: &MasterSecret, last_modified: DateTime<Utc>) -> BoxKeypair {
    let salt = last_modified.timestamp_millis().to_string();
    derive_session_box_keypair(master.as_bytes(), b"", salt.as_bytes()).0
}

/// Fold a credential map into client seed material.
///
/// Entries are consumed in sorted key order; each contributes
/// `hex(H_max(key ‖ value))`. The fold is then bound to the pinned host
/// signing key: `seed = H_max(fold ‖ hostSignPublicKeyHex)`, so the same
/// credential re-proves the same identity to the same host only.
pub fn credential_seed(
    credential: &BTreeMap<String, String>,
    host_sign_public_key_hex: &str,
) -> [u8; hash::HASH_MAX_BYTES] {
    let mut fold = String::new();
    for (key, value) in credential {
        let entry = hash::digest_max(&[key.as_bytes(), value.as_bytes()]);
        fold.push_str(&hex::encode(entry));
    }
    hash::digest_max(&[fold.as_bytes(), host_sign_public_key_hex.as_bytes()])
}

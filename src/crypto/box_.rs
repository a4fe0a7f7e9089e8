//! Authenticated public-key encryption ("box"), anonymous sealing, and
//! the symmetric secretbox used by the credential cache.
//!
//! A box between two parties is X25519 Diffie-Hellman over their static
//! keys, expanded through HKDF-SHA-256 into an XChaCha20-Poly1305 key.
//! Both directions derive the same key, so either side can open what the
//! other sealed. Nonces are 24 bytes and travel next to the ciphertext.
//!
//! An anonymous seal prepends a fresh ephemeral public key to a box
//! encrypted under `DH(ephemeral, recipient)`; the nonce is derived from
//! the two public keys, so the recipient needs nothing beyond the sealed
//! bytes and its own keypair.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use super::error::CryptoError;
use super::hash;

/// Box nonce size (XChaCha20-Poly1305, 192 bits)
pub const BOX_NONCE_BYTES: usize = 24;

/// Box keypair seed size
pub const BOX_SEED_BYTES: usize = 32;

/// HKDF info for two-party boxes
const BOX_KDF_INFO: &[u8] = b"soauth/v1/box";

/// HKDF info for anonymous seals
const SEAL_KDF_INFO: &[u8] = b"soauth/v1/seal";

/// X25519 public key half of a box keypair.
#[derive(Clone, PartialEq, Eq)]
pub struct BoxPublicKey([u8; 32]);

impl BoxPublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking length
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = slice
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("Expected 32 bytes, got {}", slice.len())))?;
        Ok(Self(bytes))
    }

    /// Decode from the hex wire representation
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        Self::from_slice(&hex::decode(hex_str)?)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex wire representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for BoxPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BoxPublicKey({}...)", hex::encode(&self.0[..4]))
    }
}

/// X25519 box keypair.
///
/// Built from a 32-byte seed (deterministic, rederivable) or generated
/// fresh for ephemeral use inside seals.
pub struct BoxKeypair {
    secret: StaticSecret,
    public: BoxPublicKey,
}

impl BoxKeypair {
    /// Derive a keypair from a 32-byte seed. Same seed, same keypair.
    pub fn from_seed(seed: [u8; BOX_SEED_BYTES]) -> Self {
        let secret = StaticSecret::from(seed);
        let public = X25519Public::from(&secret);
        Self {
            secret,
            public: BoxPublicKey::from_bytes(public.to_bytes()),
        }
    }

    /// Generate a random keypair (ephemeral seal keys).
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519Public::from(&secret);
        Self {
            secret,
            public: BoxPublicKey::from_bytes(public.to_bytes()),
        }
    }

    /// Wrap an existing X25519 secret (Ed25519-converted signing keys).
    pub(crate) fn from_static_secret(secret: StaticSecret) -> Self {
        let public = X25519Public::from(&secret);
        Self {
            secret,
            public: BoxPublicKey::from_bytes(public.to_bytes()),
        }
    }

    /// The public half
    pub fn public_key(&self) -> &BoxPublicKey {
        &self.public
    }
}

impl std::fmt::Debug for BoxKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxKeypair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh random box nonce.
pub fn generate_nonce() -> [u8; BOX_NONCE_BYTES] {
    let mut nonce = [0u8; BOX_NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Symmetric key for a (self, peer) pair: DH then HKDF expand.
fn shared_cipher(
    secret: &StaticSecret,
    peer: &BoxPublicKey,
    info: &[u8],
) -> Result<XChaCha20Poly1305, CryptoError> {
    let peer_point = X25519Public::from(*peer.as_bytes());
    let shared = secret.diffie_hellman(&peer_point);

    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(info, &mut key)
        .map_err(|e| CryptoError::EncryptionFailed(format!("HKDF expand failed: {e}")))?;

    Ok(XChaCha20Poly1305::new(&key.into()))
}

/// Encrypt `plaintext` from `keypair` to `peer` under `nonce`.
pub fn box_encrypt(
    plaintext: &[u8],
    nonce: &[u8; BOX_NONCE_BYTES],
    peer: &BoxPublicKey,
    keypair: &BoxKeypair,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = shared_cipher(&keypair.secret, peer, BOX_KDF_INFO)?;
    cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Open a box from `peer`. Fails on any tampering with ciphertext or nonce.
pub fn box_decrypt(
    ciphertext: &[u8],
    nonce: &[u8; BOX_NONCE_BYTES],
    peer: &BoxPublicKey,
    keypair: &BoxKeypair,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = shared_cipher(&keypair.secret, peer, BOX_KDF_INFO)?;
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Seal `plaintext` anonymously to `recipient`.
///
/// Output: ephemeral public key (32 bytes) ‖ ciphertext. The nonce is the
/// first 24 bytes of `SHA-512(ephemeral_pk ‖ recipient_pk)`; it is unique
/// per seal because the ephemeral key is.
pub fn seal(plaintext: &[u8], recipient: &BoxPublicKey) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = BoxKeypair::generate();
    let nonce = seal_nonce(ephemeral.public_key(), recipient);

    let cipher = shared_cipher(&ephemeral.secret, recipient, SEAL_KDF_INFO)?;
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut sealed = Vec::with_capacity(32 + ciphertext.len());
    sealed.extend_from_slice(ephemeral.public_key().as_bytes());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open an anonymous seal addressed to `keypair`.
pub fn seal_open(sealed: &[u8], keypair: &BoxKeypair) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < 32 + 16 {
        return Err(CryptoError::SealTooShort);
    }

    let ephemeral = BoxPublicKey::from_slice(&sealed[..32])?;
    let nonce = seal_nonce(&ephemeral, keypair.public_key());

    let cipher = shared_cipher(&keypair.secret, &ephemeral, SEAL_KDF_INFO)?;
    cipher
        .decrypt(XNonce::from_slice(&nonce), &sealed[32..])
        .map_err(|_| CryptoError::DecryptionFailed)
}

fn seal_nonce(ephemeral: &BoxPublicKey, recipient: &BoxPublicKey) -> [u8; BOX_NONCE_BYTES] {
    let digest = hash::digest_max(&[ephemeral.as_bytes(), recipient.as_bytes()]);
    let mut nonce = [0u8; BOX_NONCE_BYTES];
    nonce.copy_from_slice(&digest[..BOX_NONCE_BYTES]);
    nonce
}

/// Symmetric authenticated encryption under a 32-byte key (secretbox).
pub fn secretbox_encrypt(
    plaintext: &[u8],
    nonce: &[u8; BOX_NONCE_BYTES],
    key: &[u8; 32],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Open a secretbox.
pub fn secretbox_decrypt(
    ciphertext: &[u8],
    nonce: &[u8; BOX_NONCE_BYTES],
    key: &[u8; 32],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

//! Ed25519 signing with combined envelopes.
//!
//! Signed messages travel as `signature(64) ‖ message`, so opening an
//! envelope both verifies and extracts in one step. Signing keypairs are
//! always seed-derived; there is no random signing key generation anywhere
//! in the protocol.
//!
//! Signing identities double as seal recipients: an Ed25519 key converts
//! to X25519 (scalar clamp / Montgomery mapping), which lets a client seal
//! its negotiation request to the host's pinned signing key alone.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use x25519_dalek::StaticSecret;

use super::box_::{BoxKeypair, BoxPublicKey};
use super::error::CryptoError;

/// Signing seed size
pub const SIGN_SEED_BYTES: usize = 32;

/// Detached signature size
pub const SIGNATURE_BYTES: usize = 64;

/// Ed25519 public key half of a signing keypair.
#[derive(Clone, PartialEq, Eq)]
pub struct SignPublicKey([u8; 32]);

impl SignPublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Decode from the hex wire representation
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = hex::decode(hex_str)?
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("Expected 32-byte signing key".to_string()))?;
        Ok(Self(bytes))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex wire representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Convert to the equivalent X25519 public key for sealing.
    pub fn to_box_public(&self) -> Result<BoxPublicKey, CryptoError> {
        let verifying = VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let montgomery = verifying.to_montgomery();
        Ok(BoxPublicKey::from_bytes(*montgomery.as_bytes()))
    }
}

impl std::fmt::Debug for SignPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SignPublicKey({}...)", hex::encode(&self.0[..4]))
    }
}

/// Ed25519 signing keypair, seed-derived.
pub struct SignKeypair {
    signing: SigningKey,
}

impl SignKeypair {
    /// Derive a keypair from a 32-byte seed. Same seed, same keypair.
    pub fn from_seed(seed: [u8; SIGN_SEED_BYTES]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// The public half
    pub fn public_key(&self) -> SignPublicKey {
        SignPublicKey::from_bytes(self.signing.verifying_key().to_bytes())
    }

    /// Produce a combined envelope: signature ‖ message.
    pub fn sign_combined(&self, message: &[u8]) -> Vec<u8> {
        let signature = self.signing.sign(message);
        let mut signed = Vec::with_capacity(SIGNATURE_BYTES + message.len());
        signed.extend_from_slice(&signature.to_bytes());
        signed.extend_from_slice(message);
        signed
    }

    /// Convert to the equivalent X25519 keypair for opening seals
    /// addressed to this signing identity.
    pub fn to_box_keypair(&self) -> BoxKeypair {
        let scalar = self.signing.to_scalar_bytes();
        BoxKeypair::from_static_secret(StaticSecret::from(scalar))
    }
}

impl std::fmt::Debug for SignKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignKeypair")
            .field("public", &self.public_key())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Verify a combined envelope against `public` and extract the message.
pub fn open_combined(signed: &[u8], public: &SignPublicKey) -> Result<Vec<u8>, CryptoError> {
    if signed.len() < SIGNATURE_BYTES {
        return Err(CryptoError::BadSignature);
    }

    let (sig_bytes, message) = signed.split_at(SIGNATURE_BYTES);
    let sig_array: [u8; SIGNATURE_BYTES] =
        sig_bytes.try_into().map_err(|_| CryptoError::BadSignature)?;
    let signature = Signature::from_bytes(&sig_array);

    let verifying =
        VerifyingKey::from_bytes(public.as_bytes()).map_err(|_| CryptoError::BadSignature)?;

    verifying
        .verify(message, &signature)
        .map_err(|_| CryptoError::BadSignature)?;

    Ok(message.to_vec())
}

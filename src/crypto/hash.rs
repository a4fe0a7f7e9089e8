//! Generic and keyed hash primitives.
//!
//! All key derivation in SoAuth reduces to two digest widths: a 64-byte
//! "max" digest (SHA-512) for intermediate seeds, and a 32-byte digest
//! (SHA-256) sized for Ed25519/X25519 seeds. Multi-part inputs are fed to
//! the hash in argument order, never pre-concatenated by the caller, so
//! `secret ‖ hostId` and `secret ‖ host ‖ Id` hash identically only when
//! the byte streams are identical.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

/// Width of the max-size generic hash (intermediate seeds)
pub const HASH_MAX_BYTES: usize = 64;

/// Width of the seed-size hash (Ed25519/X25519 seeds, secretbox keys)
pub const SEED_BYTES: usize = 32;

/// Max-width generic hash over the concatenation of `parts`.
pub fn digest_max(parts: &[&[u8]]) -> [u8; HASH_MAX_BYTES] {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_MAX_BYTES];
    out.copy_from_slice(&digest);
    out
}

/// Seed-width generic hash over the concatenation of `parts`.
pub fn digest_seed(parts: &[&[u8]]) -> [u8; SEED_BYTES] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Keyed hash (HMAC-SHA-256).
///
/// Used where the output must be bound to a key rather than merely to the
/// input, e.g. device fingerprints under a fixed application tag.
pub fn keyed(key: &[u8], data: &[u8]) -> [u8; SEED_BYTES] {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

//! Cryptographic primitives and key derivation for SoAuth.
//!
//! This module is the protocol's primitive provider plus its Key
//! Derivation Engine:
//!
//! - **Signatures**: Ed25519, combined `signature ‖ message` envelopes
//! - **Box**: authenticated public-key encryption between two known
//!   parties (X25519 → HKDF-SHA-256 → XChaCha20-Poly1305)
//! - **Seal**: anonymous public-key encryption to a recipient, including
//!   recipients known only by their signing key (Ed25519→X25519)
//! - **Secretbox**: symmetric AEAD for encrypted-at-rest client state
//! - **Hashing**: SHA-512 / SHA-256 generic digests, HMAC-SHA-256 keyed
//! - **Derivation**: deterministic and session-scoped keypairs from
//!   `(secret, contextual salt)` pairs
//!
//! # Keyless server
//!
//! The load-bearing property is determinism: for a fixed
//! `(MasterSecret, hostId)` the signing keypair is always the same, and
//! for a fixed `(MasterSecret, lastModified)` the session box keypair is
//! always the same. A host therefore stores only public material and small
//! salts; compromising its data store without the master secret yields no
//! private keys.
//!
//! # Example
//!
//! ```rust,ignore
//! use soauth::crypto::{derive_sign_keypair, derive_box_keypair};
//!
//! let sign = derive_sign_keypair(master.as_bytes(), b"my-host-id");
//! println!("pinned host key: {}", sign.public_key().to_hex());
//! ```

mod box_;
mod derive;
mod error;
pub mod hash;
mod sign;

pub use box_::{
    box_decrypt, box_encrypt, generate_nonce, seal, seal_open, secretbox_decrypt,
    secretbox_encrypt, BoxKeypair, BoxPublicKey, BOX_NONCE_BYTES, BOX_SEED_BYTES,
};
pub use derive::{
    credential_seed, derive_box_keypair, derive_session_box_keypair, derive_sign_keypair,
    host_session_box_keypair, MasterSecret,
};
pub use error::CryptoError;
pub use sign::{open_combined, SignKeypair, SignPublicKey, SIGNATURE_BYTES, SIGN_SEED_BYTES};

//! Crypto error types.

use thiserror::Error;

/// Errors from cryptographic operations.
///
/// Verification failures (`BadSignature`, `DecryptionFailed`) carry no
/// detail on purpose: the wire layer must not reveal which check failed.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key bytes have the wrong length or encoding
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Hex field could not be decoded
    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    /// Signature did not verify, or the signed envelope is malformed
    #[error("Signature verification failed")]
    BadSignature,

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Auth tag mismatch or corrupted data
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Sealed envelope shorter than an ephemeral public key + tag
    #[error("Sealed envelope too short")]
    SealTooShort,
}

impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        CryptoError::InvalidHex(err.to_string())
    }
}

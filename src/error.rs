//! SoAuth error types.
//!
//! The taxonomy distinguishes what the *caller* may learn from what the
//! *wire* may reveal. Signature and decryption failures are separate
//! variants internally but collapse to one generic wire message, so a
//! probing client cannot learn which check failed. The single deliberate
//! exception is [`SoAuthError::FingerprintMismatch`]: it is a usability
//! signal, not a secrecy boundary, and clients key their cache-purge
//! behavior off its distinguished message.

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::wire::Intention;

/// SoAuth protocol errors.
#[derive(Debug, Error)]
pub enum SoAuthError {
    /// Request or payload shape is not one the protocol accepts.
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Signature did not verify against the presented public key.
    #[error("Signature verification failed")]
    SignatureVerification,

    /// The targeted host id is not in this host's served set.
    #[error("Unknown host: {0}")]
    UnknownHost(String),

    /// Register on an existing identity, or login on an absent one.
    #[error("Unable to {0}")]
    IntentionConflict(Intention),

    /// Token resolves to no access record.
    #[error("Token not found")]
    TokenNotFound,

    /// Ciphertext failed to authenticate or decrypt.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Presented fingerprint differs from the one bound at negotiation.
    ///
    /// Distinguished on the wire ("Expired fingerprint") so clients purge
    /// their cache and restart negotiation instead of retrying blindly.
    #[error("Expired fingerprint")]
    FingerprintMismatch,

    /// Stored client credential is older than the cache TTL.
    #[error("Credential cache expired")]
    CredentialCacheExpired,

    /// Operation requires a negotiated session.
    #[error("Session not established")]
    SessionNotEstablished,

    /// The host rejected a client request (client-side only).
    #[error("Rejected by host: {0}")]
    Rejected(String),

    /// Access store failure. Fatal to the current request, never a
    /// partial write.
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Client transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Cryptographic operation failed.
    ///
    /// Preserves the full error chain via `#[source]`; the chain is for
    /// logs, never for wire responses.
    #[error("Crypto error: {0}")]
    Crypto(#[source] CryptoError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for SoAuth operations
pub type Result<T> = std::result::Result<T, SoAuthError>;

impl From<CryptoError> for SoAuthError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptionFailed => SoAuthError::DecryptionFailed,
            CryptoError::BadSignature => SoAuthError::SignatureVerification,
            other => SoAuthError::Crypto(other),
        }
    }
}

impl From<reqwest::Error> for SoAuthError {
    fn from(err: reqwest::Error) -> Self {
        SoAuthError::Transport(err.to_string())
    }
}

impl From<toml::de::Error> for SoAuthError {
    fn from(err: toml::de::Error) -> Self {
        SoAuthError::Config(err.to_string())
    }
}

impl SoAuthError {
    /// The message a peer is allowed to see for this error.
    ///
    /// Everything that could act as a verification oracle collapses to
    /// "Invalid request". Intention conflicts and fingerprint expiry are
    /// deliberately distinguished; store and internal failures surface as
    /// a bare internal error.
    pub fn wire_message(&self) -> String {
        match self {
            SoAuthError::IntentionConflict(intention) => format!("Unable to {intention}"),
            SoAuthError::FingerprintMismatch => "Expired fingerprint".to_string(),
            SoAuthError::Store(_) | SoAuthError::Io(_) => "Internal error".to_string(),
            _ => "Invalid request".to_string(),
        }
    }

    /// Whether this error is a server fault (5xx-equivalent) rather than
    /// a rejected request.
    pub fn is_internal(&self) -> bool {
        matches!(self, SoAuthError::Store(_) | SoAuthError::Io(_))
    }
}

//! # SoAuth - Credential-less Mutual Authentication
//!
//! A mutual-authentication and secure-channel protocol where the host
//! never stores a private key: every asymmetric key derives
//! deterministically from a master secret plus contextual salts. The
//! host issues a session token bound to a rederivable session key and an
//! optional device fingerprint; all application traffic travels as
//! authenticated-encrypted envelopes keyed by that token.
//!
//! ## Protocol Overview
//!
//! ```text
//! Client                              Host
//!    |                                  |
//!    |---- negotiate (signed, sealed) ->|  verify, register/login policy,
//!    |                                  |  rotate token + lastModified
//!    |<--- sealed {boxKey, token} ------|
//!    |                                  |
//!    |==== {ciphertext, nonce, token} =>|  resolve token, check fingerprint,
//!    |                                  |  REDERIVE session key, decrypt
//!    |<=== {ciphertext, nonce} =========|
//!    |                                  |
//!    |---- logout/:token -------------->|  tombstone slot (idempotent)
//! ```
//!
//! ### State Machine
//!
//! ```text
//!                 negotiate()
//!  [Unauthenticated] ──────────> [AwaitingVerification]
//!         ^                              │
//!         │ failure / logout             │ sealed reply verified
//!         │                              v
//!         └───────────────────── [Authenticated]
//! ```
//!
//! ## Keyless server
//!
//! | Key                    | Derived from                                  |
//! |------------------------|-----------------------------------------------|
//! | Host signing identity  | `H(H(master ‖ hostId))`                       |
//! | Session box keypair    | `H(H(master) ‖ slot.lastModified)`            |
//! | Client signing identity| `H(H(credential fold ‖ pinned host key))`     |
//! | Client session box key | credential seed + fresh randomness            |
//! | S2S / machine keys     | `H(H(passphrase ‖ context))`                  |
//!
//! Nothing on the host side outlives a request; the access store holds
//! only public keys, tokens, and salts. Stealing it without the master
//! secret yields no private keys.
//!
//! ## Quick Start
//!
//! ### Host
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use soauth::crypto::MasterSecret;
//! use soauth::host::HostConfig;
//! use soauth::server::{create_router, AppState};
//! use soauth::store::MemoryStore;
//!
//! let host = HostConfig::new(MasterSecret::from("secret"), vec!["self".into()])?;
//! host.announce_identities(); // print the keys clients pin
//!
//! let state = Arc::new(AppState::new(host, MemoryStore::new()));
//! axum::serve(listener, create_router(state)).await?;
//! ```
//!
//! ### Client
//!
//! ```rust,ignore
//! use soauth::client::{Client, ClientConfig};
//! use soauth::wire::Intention;
//!
//! let mut client = Client::new(ClientConfig {
//!     host_id: "self".into(),
//!     endpoint: "https://example.org".into(),
//!     host_sign_public_key: pinned_key,
//!     enable_fingerprint: true,
//! })?;
//!
//! client.negotiate(&credential, Intention::Register, meta).await?;
//! let reply = client.exchange(&serde_json::json!("hello"), "/message").await?;
//! client.save("storage-secret")?; // encrypted at rest, 12 h TTL
//! ```
//!
//! ## Modules
//!
//! - [`crypto`]: primitives and the Key Derivation Engine
//! - [`wire`]: JSON wire envelopes and payload serialization
//! - [`store`]: access records and the store contract
//! - [`channel`]: session channel encryption
//! - [`host`]: negotiation, token gateway, machine registry
//! - [`client`]: negotiating client, machine client, credential cache
//! - [`s2s`]: server-to-server static channel
//! - [`fingerprint`]: device fingerprint generation
//! - [`server`]: axum HTTP surface
//! - [`config`]: TOML + env process configuration
//! - [`error`]: error taxonomy and result alias

pub mod channel;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fingerprint;
pub mod host;
pub mod s2s;
pub mod server;
pub mod store;
pub mod wire;

// Re-exports for convenience
pub use channel::{decrypt_payload, encrypt_payload, StaticChannel};
pub use client::{Client, ClientConfig, CredentialCache, MachineClient};
pub use config::Config;
pub use crypto::MasterSecret;
pub use error::{Result, SoAuthError};
pub use fingerprint::device_fingerprint;
pub use host::{HostConfig, MachineRegistry, Negotiator, TokenGateway};
pub use s2s::S2sChannel;
pub use server::AppState;
pub use store::{AccessQuery, AccessRecord, AccessStore, MemoryStore, SessionSlot};
pub use wire::Intention;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// SoAuth protocol version
pub const PROTOCOL_VERSION: &str = "1.0";

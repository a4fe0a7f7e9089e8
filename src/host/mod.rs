//! Host-side protocol: negotiation, session channel, token gateway.
//!
//! A host is a configuration value plus a store - nothing else. No
//! session object survives between requests; every key the host needs is
//! rederived from the master secret and a record-stored salt, so request
//! handling is stateless and share-nothing.
//!
//! # Request flow
//!
//! ```text
//! POST /soauth            Negotiator::probe    register/login, sealed reply
//! POST <app route>        TokenGateway::authorize
//!                             -> resolve token -> check fingerprint
//!                             -> rederive session key -> decrypt payload
//!                         handler sees plaintext, replies via reply()
//! ALL  /soauth/logout/:t  TokenGateway::logout  tombstone, idempotent
//! POST /machine           MachineRegistry::channel_for  static channel
//! ```

mod config;
mod gateway;
mod machine;
mod negotiate;
mod session;

pub use config::{HostConfig, DEFAULT_NEGOTIATION_DELAY};
pub use gateway::{AuthorizedExchange, ResolvedAccess, TokenGateway};
pub use machine::{MachinePeer, MachineRegistry};
pub use negotiate::{fresh_token, Negotiator};
pub use session::{decrypt_for_slot, encrypt_for_slot};

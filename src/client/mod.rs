//! Client-side protocol: negotiation, exchange, persistence.
//!
//! Two kinds of client exist:
//!
//! - **Human** ([`Client`]): derives a signing identity from a credential
//!   and the pinned host key, negotiates a session over HTTP, and can
//!   persist it encrypted-at-rest with a 12-hour TTL.
//! - **Machine** ([`MachineClient`]): a deterministic identity registered
//!   out of band; no negotiation at all.
//!
//! The protocol steps are transport-free ([`PendingNegotiation`],
//! [`ClientSession`]); only [`Client`] knows about HTTP.

mod cache;
mod human;
mod machine;

pub use cache::{CredentialCache, StoredClientCredential, CACHE_TTL_HOURS};
pub use human::{Client, ClientConfig, ClientSession, PendingNegotiation};
pub use machine::MachineClient;

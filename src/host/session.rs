//! Host side of the Session Channel: stateless key rederivation.
//!
//! The host never keeps a session keypair in memory between requests.
//! Before any encrypt or decrypt it rederives the keypair from the master
//! secret and the slot's `lastModified` salt, making every operation
//! idempotent across stateless request handling - and leaving nothing
//! worth stealing in a dump of the access store.

use serde_json::Value;

use crate::channel::{decrypt_payload, encrypt_payload};
use crate::crypto::{host_session_box_keypair, BoxPublicKey, MasterSecret};
use crate::error::Result;
use crate::store::SessionSlot;
use crate::wire::CipherEnvelope;

/// Encrypt a payload to the client bound to `slot`.
pub fn encrypt_for_slot(
    master: &MasterSecret,
    slot: &SessionSlot,
    payload: &Value,
) -> Result<CipherEnvelope> {
    let peer = BoxPublicKey::from_hex(&slot.box_public_key)?;
    let keypair = host_session_box_keypair(master, slot.last_modified);
    encrypt_payload(payload, &keypair, &peer)
}

/// Decrypt an envelope from the client bound to `slot`.
pub fn decrypt_for_slot(
    master: &MasterSecret,
    slot: &SessionSlot,
    envelope: &CipherEnvelope,
) -> Result<Value> {
    let peer = BoxPublicKey::from_hex(&slot.box_public_key)?;
    let keypair = host_session_box_keypair(master, slot.last_modified);
    decrypt_payload(envelope, &keypair, &peer)
}

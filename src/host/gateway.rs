//! Token Gateway: per-request authorization and logout.
//!
//! Sits in front of application handlers. Resolves the bearer token to an
//! access record, enforces the fingerprint binding, decrypts the request
//! payload, and hands the plaintext downstream. Logout tombstones the
//! matching slot and is idempotent - logging out an already-cleared token
//! is a success, not an error.

use serde_json::Value;

use crate::error::{Result, SoAuthError};
use crate::store::{AccessQuery, AccessRecord, AccessStore, AccessUpdate, SessionSlot};
use crate::wire::{CipherEnvelope, SessionRequest};

use super::config::HostConfig;
use super::session::{decrypt_for_slot, encrypt_for_slot};

/// A token resolved to its record, with the matching host's session slot
/// projected out of the per-host map.
#[derive(Debug, Clone)]
pub struct ResolvedAccess {
    /// The full access record
    pub record: AccessRecord,
    /// Which served host the token belongs to
    pub host_id: String,
    /// The live slot holding the token
    pub slot: SessionSlot,
}

/// An authorized request: who it is, and what they said.
#[derive(Debug)]
pub struct AuthorizedExchange {
    /// Resolved identity and session
    pub access: ResolvedAccess,
    /// Decrypted request payload
    pub payload: Value,
}

/// Request-scoped gateway over the host configuration and store.
pub struct TokenGateway<'a, S> {
    config: &'a HostConfig,
    store: &'a S,
}

impl<'a, S: AccessStore> TokenGateway<'a, S> {
    /// Create a gateway over the given configuration and store
    pub fn new(config: &'a HostConfig, store: &'a S) -> Self {
        Self { config, store }
    }

    /// Resolve a token to its record and slot. `None` when nothing holds
    /// the token (including tombstoned slots).
    pub async fn resolve(&self, token: &str) -> Result<Option<ResolvedAccess>> {
        if token.is_empty() {
            return Ok(None);
        }

        let Some(record) = self
            .store
            .find_one(AccessQuery::Token(token.to_string()))
            .await?
        else {
            return Ok(None);
        };

        let Some((host_id, slot)) = record.slot_for_token(token) else {
            return Ok(None);
        };

        Ok(Some(ResolvedAccess {
            host_id: host_id.to_string(),
            slot: slot.clone(),
            record: record.clone(),
        }))
    }

    /// Authorize a session request and decrypt its payload.
    ///
    /// A fingerprint header, when present, must equal the fingerprint
    /// bound at negotiation; any difference (including no stored value)
    /// is the distinguished [`SoAuthError::FingerprintMismatch`].
    pub async fn authorize(
        &self,
        request: &SessionRequest,
        fingerprint: Option<&str>,
    ) -> Result<AuthorizedExchange> {
        let access = self
            .resolve(&request.token)
            .await?
            .ok_or(SoAuthError::TokenNotFound)?;

        if let Some(presented) = fingerprint {
            if access.slot.fingerprint.as_deref() != Some(presented) {
                tracing::debug!(host_id = %access.host_id, "fingerprint mismatch");
                return Err(SoAuthError::FingerprintMismatch);
            }
        }

        let payload = decrypt_for_slot(
            self.config.master_secret(),
            &access.slot,
            &request.envelope,
        )?;

        Ok(AuthorizedExchange { access, payload })
    }

    /// Encrypt a reply to the session behind `access`.
    pub fn reply(&self, access: &ResolvedAccess, payload: &Value) -> Result<CipherEnvelope> {
        encrypt_for_slot(self.config.master_secret(), &access.slot, payload)
    }

    /// Tombstone the slot holding `token`.
    ///
    /// Returns `true` when a slot was cleared, `false` when the token
    /// resolved to nothing; callers report both as success.
    pub async fn logout(&self, token: &str) -> Result<bool> {
        let Some(access) = self.resolve(token).await? else {
            return Ok(false);
        };

        let mut cleared = access.slot.clone();
        cleared.clear();

        self.store
            .update(AccessUpdate {
                sign_public_key: access.record.sign_public_key.clone(),
                host_id: access.host_id.clone(),
                slot: cleared,
                meta: None,
            })
            .await?;

        tracing::debug!(host_id = %access.host_id, "session logged out");
        Ok(true)
    }
}

//! Host-side negotiation: probe incoming register/login requests.
//!
//! The host accepts either wire form of a negotiation request (direct or
//! sealed), verifies the client's signature, applies the intention policy
//! against the access store, and - on success - answers with a sealed
//! reply carrying the fresh token and its session box public key.
//!
//! ```text
//! Client                                Host
//!    |                                    |
//!    |-- {sealed, hostId} -------------->|  unseal with sign-derived key
//!    |   or {signature, signPublicKey}   |  verify signature
//!    |                                    |  check hostId + pinned key
//!    |                                    |  register: create (unique) /
//!    |                                    |  login: rotate slot
//!    |<-- {success, sealed} -------------|  seal {intention, boxPublicKey,
//!    |                                    |        token} to client box key
//! ```
//!
//! The intention policy is the sole duplicate-registration and
//! unknown-login guard: `register` requires that `create` wins the
//! store's uniqueness constraint, `login` requires an existing record.
//! Every verification failure leaves the wire as the same generic
//! rejection.

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::{
    hash, host_session_box_keypair, open_combined, seal, seal_open, BoxPublicKey, MasterSecret,
    SignPublicKey,
};
use crate::error::{Result, SoAuthError};
use crate::store::{AccessQuery, AccessRecord, AccessStore, AccessUpdate, SessionSlot};
use crate::wire::{
    DirectNegotiateRequest, HostReply, Intention, NegotiateRequest, NegotiateResponse,
    SignedNegotiation,
};

use super::config::HostConfig;

/// Generate a fresh session token: max-width hash over the hashed master
/// secret and fresh randomness, hex-encoded. Unguessable, rotated on
/// every successful negotiation.
pub fn fresh_token(master: &MasterSecret) -> String {
    let seed = hash::digest_max(&[master.as_bytes()]);
    let mut random = [0u8; 8];
    OsRng.fill_bytes(&mut random);
    hex::encode(hash::digest_max(&[&seed, &random]))
}

/// Host-side negotiation handler.
///
/// Borrows the host configuration and store; holds no state of its own,
/// so one instance per request costs nothing and concurrent probes never
/// contend outside the store.
pub struct Negotiator<'a, S> {
    config: &'a HostConfig,
    store: &'a S,
}

impl<'a, S: AccessStore> Negotiator<'a, S> {
    /// Create a negotiator over the given configuration and store
    pub fn new(config: &'a HostConfig, store: &'a S) -> Self {
        Self { config, store }
    }

    /// Run one negotiation.
    ///
    /// `fingerprint` is the `SoAuth-Fingerprint` header value, bound to
    /// the session slot when present. Errors map to oracle-safe wire
    /// messages via [`SoAuthError::wire_message`].
    pub async fn probe(
        &self,
        request: &NegotiateRequest,
        fingerprint: Option<&str>,
    ) -> Result<NegotiateResponse> {
        // Uniform throttle against brute-force probing, applied before
        // any validation so timing reveals nothing.
        let delay = self.config.negotiation_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let direct = self.unwrap_request(request)?;
        let (message, sign_public_key) = self.verify_signature(&direct)?;

        if let NegotiateRequest::Sealed(sealed) = request {
            if sealed.host_id != message.host_id {
                return Err(SoAuthError::InvalidMessageFormat(
                    "sealed hostId does not match signed message".to_string(),
                ));
            }
        }

        let host_sign = self
            .config
            .sign_keypair(&message.host_id)
            .ok_or_else(|| SoAuthError::UnknownHost(message.host_id.clone()))?;

        // The client must be talking to *this* host's identity; a request
        // signed for some other pinned key is rejected like any forgery.
        if host_sign.public_key().to_hex() != message.server_sign_public_key {
            tracing::debug!(host_id = %message.host_id, "pinned host key mismatch");
            return Err(SoAuthError::SignatureVerification);
        }

        let client_box_public = BoxPublicKey::from_hex(&message.box_public_key)?;

        let token = fresh_token(self.config.master_secret());
        let now = Utc::now();
        let slot = SessionSlot::new(
            token.clone(),
            message.box_public_key.clone(),
            now,
            fingerprint.map(str::to_string),
        );

        self.apply_intention(&message, &sign_public_key, slot)
            .await?;

        // Session keypair from the salt just stored; rederivable on every
        // later request from (master secret, lastModified) alone.
        let session = host_session_box_keypair(self.config.master_secret(), now);
        let reply = HostReply {
            intention: message.intention,
            box_public_key: session.public_key().to_hex(),
            token,
        };
        let sealed_reply = seal(&serde_json::to_vec(&reply)?, &client_box_public)?;

        tracing::debug!(
            intention = %message.intention,
            host_id = %message.host_id,
            "negotiation complete"
        );

        Ok(NegotiateResponse::sealed(hex::encode(sealed_reply)))
    }

    /// Reduce either wire form to the direct request.
    fn unwrap_request(&self, request: &NegotiateRequest) -> Result<DirectNegotiateRequest> {
        match request {
            NegotiateRequest::Direct(direct) => Ok(direct.clone()),
            NegotiateRequest::Sealed(sealed) => {
                let host_sign = self
                    .config
                    .sign_keypair(&sealed.host_id)
                    .ok_or_else(|| SoAuthError::UnknownHost(sealed.host_id.clone()))?;

                let sealed_bytes = hex::decode(&sealed.sealed).map_err(|_| {
                    SoAuthError::InvalidMessageFormat("sealed is not valid hex".to_string())
                })?;
                let opened = seal_open(&sealed_bytes, &host_sign.to_box_keypair())?;

                serde_json::from_slice(&opened).map_err(|_| {
                    SoAuthError::InvalidMessageFormat("sealed content is not a request".to_string())
                })
            }
        }
    }

    /// Verify the combined signature and parse the signed message.
    fn verify_signature(
        &self,
        direct: &DirectNegotiateRequest,
    ) -> Result<(SignedNegotiation, SignPublicKey)> {
        let sign_public_key = SignPublicKey::from_hex(&direct.sign_public_key)?;
        let signed = hex::decode(&direct.signature).map_err(|_| {
            SoAuthError::InvalidMessageFormat("signature is not valid hex".to_string())
        })?;

        let message_bytes = open_combined(&signed, &sign_public_key)?;
        let message: SignedNegotiation = serde_json::from_slice(&message_bytes)
            .map_err(|_| SoAuthError::InvalidMessageFormat("signed message malformed".to_string()))?;

        Ok((message, sign_public_key))
    }

    /// Register creates, login rotates; anything else is a conflict.
    async fn apply_intention(
        &self,
        message: &SignedNegotiation,
        sign_public_key: &SignPublicKey,
        slot: SessionSlot,
    ) -> Result<()> {
        let key_hex = sign_public_key.to_hex();
        let existing = self
            .store
            .find_one(AccessQuery::SignPublicKey(key_hex.clone()))
            .await?;

        match (message.intention, existing) {
            (Intention::Register, None) => {
                let record = AccessRecord::new(key_hex, message.meta.clone())
                    .with_slot(message.host_id.clone(), slot);

                // The store's uniqueness constraint settles concurrent
                // registers; losing the race is a conflict like any other.
                if !self.store.create(record).await? {
                    return Err(SoAuthError::IntentionConflict(Intention::Register));
                }
                Ok(())
            }
            (Intention::Login, Some(_)) => {
                let updated = self
                    .store
                    .update(AccessUpdate {
                        sign_public_key: key_hex,
                        host_id: message.host_id.clone(),
                        slot,
                        meta: Some(message.meta.clone()),
                    })
                    .await?;

                if !updated {
                    return Err(SoAuthError::IntentionConflict(Intention::Login));
                }
                Ok(())
            }
            (intention, _) => Err(SoAuthError::IntentionConflict(intention)),
        }
    }
}

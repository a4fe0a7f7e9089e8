//! Negotiating client: deterministic identity, session exchange, cache.
//!
//! The protocol steps live in [`PendingNegotiation`] and
//! [`ClientSession`], free of any transport, so hosts and clients can be
//! exercised in-process. [`Client`] wraps them with an HTTP transport,
//! the fingerprint header, and the credential cache.
//!
//! The signing keypair is derived from `(credential, pinned host key)`
//! and dropped as soon as the request is signed - the same credential
//! re-proves the same identity without anything being stored. The box
//! keypair mixes fresh randomness and lives only for the session.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;

use crate::channel::{decrypt_payload, encrypt_payload};
use crate::crypto::{
    credential_seed, derive_session_box_keypair, hash, seal, seal_open, BoxKeypair, BoxPublicKey,
    SignKeypair, SignPublicKey,
};
use crate::error::{Result, SoAuthError};
use crate::fingerprint::device_fingerprint;
use crate::wire::{
    CipherEnvelope, DirectNegotiateRequest, HostReply, Intention, NegotiateRequest,
    NegotiateResponse, SealedNegotiateRequest, SessionRequest, SignedNegotiation,
    FINGERPRINT_HEADER,
};

use super::cache::{CredentialCache, StoredClientCredential};

/// Client-side configuration: where the host is and which key to pin.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host identity to negotiate with
    pub host_id: String,
    /// Host endpoint URL
    pub endpoint: String,
    /// Pinned host signing public key (hex), distributed out of band
    pub host_sign_public_key: String,
    /// Send a device fingerprint with every request
    pub enable_fingerprint: bool,
}

/// An in-flight negotiation: derived keys held until the host answers.
pub struct PendingNegotiation {
    intention: Intention,
    box_keypair: BoxKeypair,
    box_seed: [u8; 32],
    meta: Value,
}

impl PendingNegotiation {
    /// Derive keys from a credential and build the sealed request.
    ///
    /// The signing keypair is used once, here, and not retained.
    pub fn new(
        credential: &BTreeMap<String, String>,
        intention: Intention,
        host_id: &str,
        host_sign_public_key: &str,
        meta: Value,
    ) -> Result<(Self, NegotiateRequest)> {
        let pinned = SignPublicKey::from_hex(host_sign_public_key)?;

        let seed = credential_seed(credential, host_sign_public_key);
        let sign_keypair = SignKeypair::from_seed(hash::digest_seed(&[&seed]));

        let nonce_material = OsRng.next_u32().to_string();
        let (box_keypair, box_seed) =
            derive_session_box_keypair(&seed, b"", nonce_material.as_bytes());

        let message = SignedNegotiation {
            intention,
            host_id: host_id.to_string(),
            box_public_key: box_keypair.public_key().to_hex(),
            server_sign_public_key: host_sign_public_key.to_string(),
            meta: meta.clone(),
        };

        let signed = sign_keypair.sign_combined(&serde_json::to_vec(&message)?);
        let direct = DirectNegotiateRequest {
            signature: hex::encode(signed),
            sign_public_key: sign_keypair.public_key().to_hex(),
        };

        let sealed = seal(&serde_json::to_vec(&direct)?, &pinned.to_box_public()?)?;
        let request = NegotiateRequest::Sealed(SealedNegotiateRequest {
            sealed: hex::encode(sealed),
            host_id: host_id.to_string(),
        });

        Ok((
            Self {
                intention,
                box_keypair,
                box_seed,
                meta,
            },
            request,
        ))
    }

    /// Open the host's response and establish the session.
    pub fn accept(self, response: &NegotiateResponse) -> Result<ClientSession> {
        if !response.success {
            if response.message.to_lowercase().contains("expired fingerprint") {
                return Err(SoAuthError::FingerprintMismatch);
            }
            if response.message.starts_with("Unable to") {
                return Err(SoAuthError::IntentionConflict(self.intention));
            }
            return Err(SoAuthError::Rejected(response.message.clone()));
        }

        let sealed_hex = response
            .sealed
            .as_ref()
            .ok_or_else(|| SoAuthError::Rejected("response carries no seal".to_string()))?;
        let sealed = hex::decode(sealed_hex)
            .map_err(|_| SoAuthError::InvalidMessageFormat("seal is not valid hex".to_string()))?;

        let opened = seal_open(&sealed, &self.box_keypair)?;
        let reply: HostReply = serde_json::from_slice(&opened)
            .map_err(|_| SoAuthError::InvalidMessageFormat("host reply malformed".to_string()))?;

        // A response for the wrong intention is not ours
        if reply.intention != self.intention {
            return Err(SoAuthError::Rejected("intention mismatch".to_string()));
        }

        Ok(ClientSession {
            box_keypair: self.box_keypair,
            box_seed: self.box_seed,
            host_box_public_key: BoxPublicKey::from_hex(&reply.box_public_key)?,
            token: reply.token,
            meta: self.meta,
        })
    }
}

/// An established session: box keypair, host session key, token.
#[derive(Debug)]
pub struct ClientSession {
    box_keypair: BoxKeypair,
    box_seed: [u8; 32],
    host_box_public_key: BoxPublicKey,
    token: String,
    meta: Value,
}

impl ClientSession {
    /// The bearer token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Encrypt a payload into an authenticated session request.
    pub fn encrypt_request(&self, payload: &Value) -> Result<SessionRequest> {
        let envelope = encrypt_payload(payload, &self.box_keypair, &self.host_box_public_key)?;
        Ok(SessionRequest {
            envelope,
            token: self.token.clone(),
        })
    }

    /// Decrypt a session response from the host.
    pub fn decrypt_response(&self, envelope: &CipherEnvelope) -> Result<Value> {
        decrypt_payload(envelope, &self.box_keypair, &self.host_box_public_key)
    }

    /// Snapshot for the credential cache.
    pub fn to_stored(&self, host_id: &str, endpoint: &str) -> StoredClientCredential {
        StoredClientCredential {
            host_id: host_id.to_string(),
            host_endpoint: endpoint.to_string(),
            host_box_public_key: self.host_box_public_key.to_hex(),
            box_seed: hex::encode(self.box_seed),
            token: self.token.clone(),
            meta: self.meta.clone(),
            ts: Utc::now(),
        }
    }

    /// Rebuild a session from a cached credential; the box keypair is
    /// rederived from the stored seed.
    pub fn from_stored(credential: &StoredClientCredential) -> Result<Self> {
        let seed_bytes = hex::decode(&credential.box_seed)
            .map_err(|_| SoAuthError::InvalidMessageFormat("boxSeed is not valid hex".to_string()))?;
        let seed: [u8; 32] = seed_bytes.try_into().map_err(|_| {
            SoAuthError::InvalidMessageFormat("boxSeed has wrong length".to_string())
        })?;

        Ok(Self {
            box_keypair: BoxKeypair::from_seed(seed),
            box_seed: seed,
            host_box_public_key: BoxPublicKey::from_hex(&credential.host_box_public_key)?,
            token: credential.token.clone(),
            meta: credential.meta.clone(),
        })
    }
}

/// HTTP client over the protocol core.
pub struct Client {
    config: ClientConfig,
    http: reqwest::Client,
    fingerprint: Option<String>,
    cache: CredentialCache,
    session: Option<ClientSession>,
}

impl Client {
    /// Create a client; the credential cache lands in the default
    /// location for the pinned host key.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let cache = CredentialCache::for_host(&config.host_sign_public_key)?;
        Ok(Self::with_cache(config, cache))
    }

    /// Create a client with an explicit cache location.
    pub fn with_cache(config: ClientConfig, cache: CredentialCache) -> Self {
        let fingerprint = config.enable_fingerprint.then(device_fingerprint);
        Self {
            config,
            http: reqwest::Client::new(),
            fingerprint,
            cache,
            session: None,
        }
    }

    /// The current bearer token, if negotiated.
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(ClientSession::token)
    }

    /// Run a register/login negotiation against the host.
    pub async fn negotiate(
        &mut self,
        credential: &BTreeMap<String, String>,
        intention: Intention,
        meta: Value,
    ) -> Result<()> {
        let (pending, request) = PendingNegotiation::new(
            credential,
            intention,
            &self.config.host_id,
            &self.config.host_sign_public_key,
            meta,
        )?;

        let body = self.post("/soauth", &serde_json::to_value(&request)?).await?;
        let response: NegotiateResponse = serde_json::from_value(body)
            .map_err(|_| SoAuthError::InvalidMessageFormat("negotiation response malformed".to_string()))?;

        self.session = Some(pending.accept(&response)?);
        Ok(())
    }

    /// Exchange an encrypted payload with the host and decrypt the reply.
    pub async fn exchange(&mut self, payload: &Value, path: &str) -> Result<Value> {
        let session = self
            .session
            .as_ref()
            .ok_or(SoAuthError::SessionNotEstablished)?;

        let request = session.encrypt_request(payload)?;
        let body = self.post(path, &serde_json::to_value(&request)?).await?;

        match serde_json::from_value::<CipherEnvelope>(body.clone()) {
            Ok(envelope) => self
                .session
                .as_ref()
                .ok_or(SoAuthError::SessionNotEstablished)?
                .decrypt_response(&envelope),
            Err(_) => {
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("invalid response format");
                Err(SoAuthError::Rejected(message.to_string()))
            }
        }
    }

    /// Log the current session out and drop it locally.
    pub async fn logout(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };

        let path = format!("/soauth/logout/{}", session.token());
        self.post(&path, &Value::Object(serde_json::Map::new()))
            .await?;
        self.cache.purge();
        Ok(())
    }

    /// Persist the current session, encrypted under `secret`.
    pub fn save(&self, secret: &str) -> Result<()> {
        let session = self
            .session
            .as_ref()
            .ok_or(SoAuthError::SessionNotEstablished)?;
        self.cache.save(
            secret,
            &session.to_stored(&self.config.host_id, &self.config.endpoint),
        )
    }

    /// Restore a cached session. `false` when nothing usable is stored;
    /// expired entries are purged and reported as
    /// [`SoAuthError::CredentialCacheExpired`].
    pub fn load(&mut self, secret: &str) -> Result<bool> {
        let Some(credential) = self.cache.load(secret)? else {
            return Ok(false);
        };

        if credential.host_id != self.config.host_id {
            self.cache.purge();
            return Ok(false);
        }

        self.session = Some(ClientSession::from_stored(&credential)?);
        Ok(true)
    }

    /// POST a JSON body; purges cache and session on the distinguished
    /// expired-fingerprint reply.
    async fn post(&mut self, path: &str, body: &Value) -> Result<Value> {
        let url = reqwest::Url::parse(&self.config.endpoint)
            .and_then(|base| base.join(path))
            .map_err(|e| SoAuthError::Config(format!("Invalid endpoint URL: {e}")))?;

        let mut request = self.http.post(url).json(body);
        if let Some(fingerprint) = &self.fingerprint {
            request = request.header(FINGERPRINT_HEADER, fingerprint);
        }

        let response: Value = request.send().await?.json().await?;

        if let Some(message) = response.get("message").and_then(Value::as_str) {
            if message.to_lowercase().contains("expired fingerprint") {
                self.cache.purge();
                self.session = None;
                return Err(SoAuthError::FingerprintMismatch);
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn credential() -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("email".to_string(), "a@x.com".to_string());
        map.insert("password".to_string(), "hunter2".to_string());
        map
    }

    fn pinned_key() -> String {
        SignKeypair::from_seed([0x31u8; 32]).public_key().to_hex()
    }

    #[test]
    fn test_pending_negotiation_builds_sealed_request() {
        let (_, request) = PendingNegotiation::new(
            &credential(),
            Intention::Register,
            "self",
            &pinned_key(),
            json!({}),
        )
        .unwrap();

        match request {
            NegotiateRequest::Sealed(sealed) => assert_eq!(sealed.host_id, "self"),
            NegotiateRequest::Direct(_) => panic!("expected sealed request"),
        }
    }

    #[test]
    fn test_session_box_key_fresh_per_negotiation() {
        let build = || {
            let (pending, _) = PendingNegotiation::new(
                &credential(),
                Intention::Register,
                "self",
                &pinned_key(),
                json!({}),
            )
            .unwrap();
            pending.box_keypair.public_key().clone()
        };

        // Same credential, two negotiations, two session keys
        assert_ne!(build(), build());
    }

    #[test]
    fn test_accept_maps_failure_messages() {
        let build = || {
            PendingNegotiation::new(
                &credential(),
                Intention::Register,
                "self",
                &pinned_key(),
                json!({}),
            )
            .unwrap()
            .0
        };

        let conflict = build().accept(&NegotiateResponse::failure("Unable to register"));
        assert!(matches!(
            conflict,
            Err(SoAuthError::IntentionConflict(Intention::Register))
        ));

        let expired = build().accept(&NegotiateResponse::failure("Expired fingerprint"));
        assert!(matches!(expired, Err(SoAuthError::FingerprintMismatch)));

        let generic = build().accept(&NegotiateResponse::failure("Invalid request"));
        assert!(matches!(generic, Err(SoAuthError::Rejected(_))));
    }

    #[test]
    fn test_session_survives_stored_roundtrip() {
        let host_box = BoxKeypair::from_seed([0x41u8; 32]);
        let session = ClientSession {
            box_keypair: BoxKeypair::from_seed([0x42u8; 32]),
            box_seed: [0x42u8; 32],
            host_box_public_key: host_box.public_key().clone(),
            token: "token-1".to_string(),
            meta: json!({"email": "a@x.com"}),
        };

        let stored = session.to_stored("self", "http://localhost:3000");
        let restored = ClientSession::from_stored(&stored).unwrap();

        // The restored session decrypts what the original's peer sends
        let envelope = crate::channel::encrypt_payload(
            &json!("welcome back"),
            &host_box,
            session.box_keypair.public_key(),
        )
        .unwrap();
        assert_eq!(
            restored.decrypt_response(&envelope).unwrap(),
            json!("welcome back")
        );
        assert_eq!(restored.token(), "token-1");
    }
}

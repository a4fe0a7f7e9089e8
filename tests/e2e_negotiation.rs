//! End-to-end negotiation and session tests.
//!
//! Drives the client and host protocol cores against each other
//! in-process, over the in-memory store - no HTTP involved. Covers the
//! register/login policy, token rotation, fingerprint binding, logout
//! idempotency, and the stateless session channel.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{json, Value};

use soauth::client::{ClientSession, PendingNegotiation};
use soauth::crypto::{credential_seed, derive_session_box_keypair, hash, MasterSecret, SignKeypair};
use soauth::error::SoAuthError;
use soauth::host::{HostConfig, Negotiator, TokenGateway};
use soauth::store::{AccessQuery, AccessStore, MemoryStore};
use soauth::wire::{
    DirectNegotiateRequest, Intention, NegotiateRequest, SignedNegotiation,
};

fn host_config() -> HostConfig {
    HostConfig::new(
        MasterSecret::from("test-secret"),
        vec!["self".to_string(), "partner".to_string()],
    )
    .unwrap()
    .with_negotiation_delay(Duration::ZERO)
}

fn pinned_key(config: &HostConfig, host_id: &str) -> String {
    config.sign_keypair(host_id).unwrap().public_key().to_hex()
}

fn credential() -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert("u".to_string(), "a".to_string());
    map.insert("p".to_string(), "b".to_string());
    map
}

/// Run one client-side negotiation against the host core.
async fn negotiate(
    config: &HostConfig,
    store: &MemoryStore,
    credential: &BTreeMap<String, String>,
    intention: Intention,
    fingerprint: Option<&str>,
    meta: Value,
) -> Result<ClientSession, SoAuthError> {
    let (pending, request) =
        PendingNegotiation::new(credential, intention, "self", &pinned_key(config, "self"), meta)?;

    let response = Negotiator::new(config, store)
        .probe(&request, fingerprint)
        .await?;
    pending.accept(&response)
}

/// The reference scenario: register, exchange "hello", get it echoed.
#[tokio::test]
async fn test_register_and_exchange() {
    let config = host_config();
    let store = MemoryStore::new();

    let session = negotiate(
        &config,
        &store,
        &credential(),
        Intention::Register,
        None,
        json!({"email": "a@x.com"}),
    )
    .await
    .unwrap();

    // Exactly one record was created, carrying the meta
    assert_eq!(store.count().await, 1);
    let record = store
        .find_one(AccessQuery::Token(session.token().to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.meta, json!({"email": "a@x.com"}));

    // Client sends "hello"; host decrypts, echoes, client decrypts
    let gateway = TokenGateway::new(&config, &store);
    let request = session.encrypt_request(&json!("hello")).unwrap();

    let exchange = gateway.authorize(&request, None).await.unwrap();
    assert_eq!(exchange.payload, json!("hello"));

    let reply = gateway.reply(&exchange.access, &exchange.payload).unwrap();
    assert_eq!(session.decrypt_response(&reply).unwrap(), json!("hello"));
}

/// A second register for the same identity must conflict.
#[tokio::test]
async fn test_duplicate_register_conflicts() {
    let config = host_config();
    let store = MemoryStore::new();

    negotiate(&config, &store, &credential(), Intention::Register, None, json!({}))
        .await
        .unwrap();

    let err = negotiate(&config, &store, &credential(), Intention::Register, None, json!({}))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SoAuthError::IntentionConflict(Intention::Register)
    ));
    assert_eq!(store.count().await, 1);
}

/// Login without a prior register must conflict.
#[tokio::test]
async fn test_login_without_record_conflicts() {
    let config = host_config();
    let store = MemoryStore::new();

    let err = negotiate(&config, &store, &credential(), Intention::Login, None, json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, SoAuthError::IntentionConflict(Intention::Login)));
}

/// Login rotates the token; the old token stops resolving.
#[tokio::test]
async fn test_login_rotates_token() {
    let config = host_config();
    let store = MemoryStore::new();

    let first = negotiate(&config, &store, &credential(), Intention::Register, None, json!({}))
        .await
        .unwrap();
    let old_token = first.token().to_string();

    let second = negotiate(&config, &store, &credential(), Intention::Login, None, json!({}))
        .await
        .unwrap();

    assert_ne!(second.token(), old_token);

    let gateway = TokenGateway::new(&config, &store);
    assert!(gateway.resolve(&old_token).await.unwrap().is_none());
    assert!(gateway.resolve(second.token()).await.unwrap().is_some());

    // Still one record: login mutated, never duplicated
    assert_eq!(store.count().await, 1);
}

/// A different credential is a different identity entirely.
#[tokio::test]
async fn test_distinct_credentials_distinct_records() {
    let config = host_config();
    let store = MemoryStore::new();

    negotiate(&config, &store, &credential(), Intention::Register, None, json!({}))
        .await
        .unwrap();

    let mut other = BTreeMap::new();
    other.insert("u".to_string(), "someone-else".to_string());
    other.insert("p".to_string(), "b".to_string());
    negotiate(&config, &store, &other, Intention::Register, None, json!({}))
        .await
        .unwrap();

    assert_eq!(store.count().await, 2);
}

/// Fingerprint binding: mismatch yields the distinguished signal.
#[tokio::test]
async fn test_fingerprint_mismatch_is_distinguished() {
    let config = host_config();
    let store = MemoryStore::new();

    let session = negotiate(
        &config,
        &store,
        &credential(),
        Intention::Register,
        Some("fingerprint-one"),
        json!({}),
    )
    .await
    .unwrap();

    let gateway = TokenGateway::new(&config, &store);
    let request = session.encrypt_request(&json!("hello")).unwrap();

    // Matching fingerprint passes
    assert!(gateway
        .authorize(&request, Some("fingerprint-one"))
        .await
        .is_ok());

    // Mismatch is the distinguished expired-fingerprint failure, with a
    // wire message distinct from the generic rejection
    let err = gateway
        .authorize(&request, Some("fingerprint-two"))
        .await
        .unwrap_err();
    assert!(matches!(err, SoAuthError::FingerprintMismatch));
    assert_eq!(err.wire_message(), "Expired fingerprint");
}

/// A session bound to no fingerprint rejects any presented one.
#[tokio::test]
async fn test_unbound_session_rejects_presented_fingerprint() {
    let config = host_config();
    let store = MemoryStore::new();

    let session = negotiate(&config, &store, &credential(), Intention::Register, None, json!({}))
        .await
        .unwrap();

    let gateway = TokenGateway::new(&config, &store);
    let request = session.encrypt_request(&json!("hello")).unwrap();

    let err = gateway
        .authorize(&request, Some("surprise"))
        .await
        .unwrap_err();
    assert!(matches!(err, SoAuthError::FingerprintMismatch));
}

/// Logout tombstones the slot and is idempotent.
#[tokio::test]
async fn test_logout_idempotent() {
    let config = host_config();
    let store = MemoryStore::new();

    let session = negotiate(&config, &store, &credential(), Intention::Register, None, json!({}))
        .await
        .unwrap();
    let token = session.token().to_string();

    let gateway = TokenGateway::new(&config, &store);
    assert!(gateway.logout(&token).await.unwrap());

    // Token no longer resolves, record persists (tombstone, not delete)
    assert!(gateway.resolve(&token).await.unwrap().is_none());
    assert_eq!(store.count().await, 1);

    // Logging out again is a no-op success, and the empty token never
    // resolves the tombstoned slot
    assert!(!gateway.logout(&token).await.unwrap());
    assert!(gateway.resolve("").await.unwrap().is_none());

    // Authorized requests for the dead session fail
    let request = session.encrypt_request(&json!("hello")).unwrap();
    let err = gateway.authorize(&request, None).await.unwrap_err();
    assert!(matches!(err, SoAuthError::TokenNotFound));
}

/// The host accepts the direct (unsealed) request form too.
#[tokio::test]
async fn test_direct_request_form() {
    let config = host_config();
    let store = MemoryStore::new();
    let pinned = pinned_key(&config, "self");

    // Build the direct request by hand from the derivation primitives
    let seed = credential_seed(&credential(), &pinned);
    let sign_keypair = SignKeypair::from_seed(hash::digest_seed(&[&seed]));
    let (box_keypair, _) = derive_session_box_keypair(&seed, b"", b"424242");

    let message = SignedNegotiation {
        intention: Intention::Register,
        host_id: "self".to_string(),
        box_public_key: box_keypair.public_key().to_hex(),
        server_sign_public_key: pinned,
        meta: json!({}),
    };
    let signed = sign_keypair.sign_combined(&serde_json::to_vec(&message).unwrap());

    let request = NegotiateRequest::Direct(DirectNegotiateRequest {
        signature: hex::encode(signed),
        sign_public_key: sign_keypair.public_key().to_hex(),
    });

    let response = Negotiator::new(&config, &store)
        .probe(&request, None)
        .await
        .unwrap();
    assert!(response.success);
    assert!(response.sealed.is_some());
}

/// Unserved host ids and mismatched pinned keys are rejected.
#[tokio::test]
async fn test_host_validation_rejections() {
    let config = host_config();
    let store = MemoryStore::new();

    // Host id outside the served set
    let (_, request) = PendingNegotiation::new(
        &credential(),
        Intention::Register,
        "nobody",
        &pinned_key(&config, "self"),
        json!({}),
    )
    .unwrap();
    let err = Negotiator::new(&config, &store)
        .probe(&request, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SoAuthError::UnknownHost(_)));

    // Request pinned to the wrong host identity: the client targets
    // "self" but pins "partner"'s key. Sealing goes to the pinned key,
    // which "self" cannot open - rejected without an oracle.
    let (_, request) = PendingNegotiation::new(
        &credential(),
        Intention::Register,
        "self",
        &pinned_key(&config, "partner"),
        json!({}),
    )
    .unwrap();
    let err = Negotiator::new(&config, &store)
        .probe(&request, None)
        .await
        .unwrap_err();
    assert_eq!(err.wire_message(), "Invalid request");
}

/// Two hosts with different master secrets are different identities.
#[tokio::test]
async fn test_independent_hosts_in_one_process() {
    let config_a = host_config();
    let config_b = HostConfig::new(MasterSecret::from("other-secret"), vec!["self".to_string()])
        .unwrap()
        .with_negotiation_delay(Duration::ZERO);

    assert_ne!(pinned_key(&config_a, "self"), pinned_key(&config_b, "self"));

    // A request built for host A is rejected by host B
    let store = MemoryStore::new();
    let (_, request) = PendingNegotiation::new(
        &credential(),
        Intention::Register,
        "self",
        &pinned_key(&config_a, "self"),
        json!({}),
    )
    .unwrap();

    assert!(Negotiator::new(&config_b, &store)
        .probe(&request, None)
        .await
        .is_err());
}

/// Per-host slots: one identity, independent sessions on two host ids.
#[tokio::test]
async fn test_multi_host_slots_are_independent() {
    let config = host_config();
    let store = MemoryStore::new();

    let (pending, request) = PendingNegotiation::new(
        &credential(),
        Intention::Register,
        "self",
        &pinned_key(&config, "self"),
        json!({}),
    )
    .unwrap();
    let response = Negotiator::new(&config, &store)
        .probe(&request, None)
        .await
        .unwrap();
    let on_self = pending.accept(&response).unwrap();

    // Same identity on a second host id must login, not register: the
    // record already exists
    let (pending, request) = PendingNegotiation::new(
        &credential(),
        Intention::Login,
        "partner",
        &pinned_key(&config, "partner"),
        json!({}),
    )
    .unwrap();
    let response = Negotiator::new(&config, &store)
        .probe(&request, None)
        .await
        .unwrap();
    let on_partner = pending.accept(&response).unwrap();

    assert_eq!(store.count().await, 1);
    assert_ne!(on_self.token(), on_partner.token());

    // Both sessions resolve to their own host's slot
    let gateway = TokenGateway::new(&config, &store);
    assert_eq!(
        gateway.resolve(on_self.token()).await.unwrap().unwrap().host_id,
        "self"
    );
    assert_eq!(
        gateway
            .resolve(on_partner.token())
            .await
            .unwrap()
            .unwrap()
            .host_id,
        "partner"
    );

    // Logging out one session leaves the other alive
    gateway.logout(on_self.token()).await.unwrap();
    assert!(gateway.resolve(on_self.token()).await.unwrap().is_none());
    assert!(gateway.resolve(on_partner.token()).await.unwrap().is_some());
}

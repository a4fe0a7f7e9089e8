//! Access records and the store contract.
//!
//! The persistent store is an external collaborator consumed through the
//! narrow [`AccessStore`] trait: `create`, `update`, `find_one`. The trait
//! is the Rust form of the original's duck-typed handler - satisfying it
//! is the capability check, done once at the type level instead of at
//! startup.
//!
//! One [`AccessRecord`] exists per client identity (unique by
//! `signPublicKey`). Per-host session state lives in a [`SessionSlot`]
//! keyed by host id, so one identity can hold independent sessions on a
//! multi-tenant host without parallel-map alignment bugs. Logout clears a
//! slot in place (tombstone); records are never physically deleted.
//!
//! [`MemoryStore`] is the reference implementation used by tests and the
//! demo binary.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::Result;

/// Per-host session state on an access record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSlot {
    /// Bearer token; empty when the slot is tombstoned
    pub token: String,
    /// Client's session box public key (hex); empty when tombstoned
    pub box_public_key: String,
    /// Rotation timestamp; doubles as the session key derivation salt
    pub last_modified: DateTime<Utc>,
    /// Device fingerprint bound at negotiation
    pub fingerprint: Option<String>,
}

impl SessionSlot {
    /// Create a live slot
    pub fn new(
        token: String,
        box_public_key: String,
        last_modified: DateTime<Utc>,
        fingerprint: Option<String>,
    ) -> Self {
        Self {
            token,
            box_public_key,
            last_modified,
            fingerprint,
        }
    }

    /// Tombstone the slot: clear token, key, and fingerprint in place.
    pub fn clear(&mut self) {
        self.token.clear();
        self.box_public_key.clear();
        self.fingerprint = None;
    }

    /// Whether this slot has been tombstoned
    pub fn is_cleared(&self) -> bool {
        self.token.is_empty()
    }
}

/// One record per client identity, optionally holding a session per
/// served host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRecord {
    /// Client's identity signing key (hex); unique across the store
    pub sign_public_key: String,
    /// Free-form metadata supplied at negotiation
    pub meta: Value,
    /// Per-host session slots
    pub slots: HashMap<String, SessionSlot>,
}

impl AccessRecord {
    /// Create a record with no sessions
    pub fn new(sign_public_key: String, meta: Value) -> Self {
        Self {
            sign_public_key,
            meta,
            slots: HashMap::new(),
        }
    }

    /// Builder: attach a session slot for a host
    pub fn with_slot(mut self, host_id: impl Into<String>, slot: SessionSlot) -> Self {
        self.slots.insert(host_id.into(), slot);
        self
    }

    /// The live slot for a host, if any
    pub fn slot(&self, host_id: &str) -> Option<&SessionSlot> {
        self.slots.get(host_id).filter(|slot| !slot.is_cleared())
    }

    /// Find the (host id, slot) pair holding `token`.
    ///
    /// Cleared slots never match - in particular an empty token must not
    /// resolve a tombstoned session.
    pub fn slot_for_token(&self, token: &str) -> Option<(&str, &SessionSlot)> {
        if token.is_empty() {
            return None;
        }
        self.slots
            .iter()
            .find(|(_, slot)| !slot.is_cleared() && slot.token == token)
            .map(|(host_id, slot)| (host_id.as_str(), slot))
    }
}

/// Queries the store must answer.
#[derive(Debug, Clone)]
pub enum AccessQuery {
    /// Record whose identity key equals the given hex string
    SignPublicKey(String),
    /// Record holding the given token in any live slot
    Token(String),
}

/// A single-document mutation: replace one host's slot, optionally the
/// metadata.
#[derive(Debug, Clone)]
pub struct AccessUpdate {
    /// Identity of the record to mutate
    pub sign_public_key: String,
    /// Which host's slot to replace
    pub host_id: String,
    /// The new slot content (a cleared slot tombstones the session)
    pub slot: SessionSlot,
    /// Replacement metadata, if any
    pub meta: Option<Value>,
}

/// The store contract.
///
/// `create` must fail (return `false`) when a record for the same
/// `signPublicKey` already exists, enforced atomically at the store -
/// this is what closes the concurrent-register race, so a prior
/// `find_one` check is never a substitute. `update` is a single-document
/// write with last-writer-wins semantics.
pub trait AccessStore: Send + Sync {
    /// Insert a new record. `false` if the identity already exists.
    fn create(&self, record: AccessRecord) -> impl Future<Output = Result<bool>> + Send;

    /// Replace one host slot on an existing record. `false` if the
    /// record does not exist.
    fn update(&self, update: AccessUpdate) -> impl Future<Output = Result<bool>> + Send;

    /// Look up a single record.
    fn find_one(&self, query: AccessQuery) -> impl Future<Output = Result<Option<AccessRecord>>> + Send;
}

/// In-memory reference store.
///
/// Uniqueness on create is atomic under a single write lock. Suitable for
/// tests and demos; a production deployment supplies its own
/// [`AccessStore`] over a real document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, AccessRecord>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identity records
    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

impl AccessStore for MemoryStore {
    async fn create(&self, record: AccessRecord) -> Result<bool> {
        let mut records = self.records.write().await;

        // Check-and-insert under one lock: the uniqueness constraint
        if records.contains_key(&record.sign_public_key) {
            return Ok(false);
        }
        records.insert(record.sign_public_key.clone(), record);
        Ok(true)
    }

    async fn update(&self, update: AccessUpdate) -> Result<bool> {
        let mut records = self.records.write().await;

        let Some(record) = records.get_mut(&update.sign_public_key) else {
            return Ok(false);
        };

        record.slots.insert(update.host_id, update.slot);
        if let Some(meta) = update.meta {
            record.meta = meta;
        }
        Ok(true)
    }

    async fn find_one(&self, query: AccessQuery) -> Result<Option<AccessRecord>> {
        let records = self.records.read().await;

        let found = match query {
            AccessQuery::SignPublicKey(key) => records.get(&key).cloned(),
            AccessQuery::Token(token) => records
                .values()
                .find(|record| record.slot_for_token(&token).is_some())
                .cloned(),
        };

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slot(token: &str) -> SessionSlot {
        SessionSlot::new(
            token.to_string(),
            "aabb".to_string(),
            Utc::now(),
            Some("fp-1".to_string()),
        )
    }

    #[tokio::test]
    async fn test_create_enforces_uniqueness() {
        let store = MemoryStore::new();
        let record = AccessRecord::new("key-1".to_string(), json!({}));

        assert!(store.create(record.clone()).await.unwrap());
        assert!(!store.create(record).await.unwrap());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_create_one_winner() {
        let store = MemoryStore::new();
        let record = AccessRecord::new("key-1".to_string(), json!({}));

        let (a, b) = tokio::join!(store.create(record.clone()), store.create(record));
        assert_ne!(a.unwrap(), b.unwrap(), "exactly one create must win");
    }

    #[tokio::test]
    async fn test_find_by_token_across_slots() {
        let store = MemoryStore::new();
        let record = AccessRecord::new("key-1".to_string(), json!({}))
            .with_slot("host-a", slot("token-a"))
            .with_slot("host-b", slot("token-b"));
        store.create(record).await.unwrap();

        let found = store
            .find_one(AccessQuery::Token("token-b".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.sign_public_key, "key-1");
        assert_eq!(found.slot_for_token("token-b").unwrap().0, "host-b");
    }

    #[tokio::test]
    async fn test_update_replaces_single_slot() {
        let store = MemoryStore::new();
        store
            .create(AccessRecord::new("key-1".to_string(), json!({})).with_slot("host-a", slot("old")))
            .await
            .unwrap();

        let updated = store
            .update(AccessUpdate {
                sign_public_key: "key-1".to_string(),
                host_id: "host-a".to_string(),
                slot: slot("new"),
                meta: None,
            })
            .await
            .unwrap();
        assert!(updated);

        let record = store
            .find_one(AccessQuery::SignPublicKey("key-1".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.slot("host-a").unwrap().token, "new");
        assert!(store
            .find_one(AccessQuery::Token("old".to_string()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = MemoryStore::new();
        let updated = store
            .update(AccessUpdate {
                sign_public_key: "ghost".to_string(),
                host_id: "host-a".to_string(),
                slot: slot("token"),
                meta: None,
            })
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_cleared_slot_never_matches() {
        let store = MemoryStore::new();
        let mut tombstone = slot("token-a");
        tombstone.clear();

        store
            .create(AccessRecord::new("key-1".to_string(), json!({})).with_slot("host-a", tombstone))
            .await
            .unwrap();

        // Neither the old token nor the empty token may resolve
        assert!(store
            .find_one(AccessQuery::Token("token-a".to_string()))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_one(AccessQuery::Token(String::new()))
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_slot_clear_is_tombstone() {
        let mut s = slot("token");
        assert!(!s.is_cleared());

        s.clear();
        assert!(s.is_cleared());
        assert!(s.box_public_key.is_empty());
        assert!(s.fingerprint.is_none());
    }
}

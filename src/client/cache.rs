//! Encrypted-at-rest client credential cache.
//!
//! Session material (`boxSeed`, token, host keys) survives process
//! restarts as a secretbox blob: `hex(ciphertext) "," hex(nonce)`, keyed
//! by a hash of a user-supplied secret. Entries expire 12 hours after
//! they were written; an expired entry is purged even when it decrypts
//! cleanly, forcing a fresh negotiation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::{generate_nonce, hash, secretbox_decrypt, secretbox_encrypt, BOX_NONCE_BYTES};
use crate::error::{Result, SoAuthError};

/// Maximum age of a stored credential
pub const CACHE_TTL_HOURS: i64 = 12;

/// What the client persists between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredClientCredential {
    /// Host identity negotiated with
    pub host_id: String,
    /// Host endpoint URL
    pub host_endpoint: String,
    /// Host's session box public key (hex)
    pub host_box_public_key: String,
    /// Session box seed (hex); the keypair is rederived, not stored
    pub box_seed: String,
    /// Bearer token
    pub token: String,
    /// Metadata sent at negotiation
    #[serde(default)]
    pub meta: Value,
    /// When this credential was written
    pub ts: DateTime<Utc>,
}

/// File-backed credential cache for one host.
#[derive(Debug, Clone)]
pub struct CredentialCache {
    path: PathBuf,
}

impl CredentialCache {
    /// Cache at an explicit path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache at the default location for a pinned host key
    /// (`<cache dir>/soauth/soauth-<hostSignPublicKey>`).
    pub fn for_host(host_sign_public_key: &str) -> Result<Self> {
        let base = dirs::cache_dir()
            .ok_or_else(|| SoAuthError::Config("No cache directory available".to_string()))?;
        Ok(Self {
            path: base
                .join("soauth")
                .join(format!("soauth-{host_sign_public_key}")),
        })
    }

    /// Where this cache lives
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seal a credential into a portable blob (for callers with their
    /// own storage).
    pub fn seal_blob(secret: &str, credential: &StoredClientCredential) -> Result<String> {
        let key = hash::digest_seed(&[secret.as_bytes()]);
        let nonce = generate_nonce();
        let plaintext = serde_json::to_vec(credential)?;
        let ciphertext = secretbox_encrypt(&plaintext, &nonce, &key)?;

        Ok(format!("{},{}", hex::encode(ciphertext), hex::encode(nonce)))
    }

    /// Open a blob produced by [`CredentialCache::seal_blob`]. Does not
    /// enforce the TTL; that belongs to [`CredentialCache::load`].
    pub fn open_blob(secret: &str, blob: &str) -> Result<StoredClientCredential> {
        let (ciphertext_hex, nonce_hex) = blob
            .split_once(',')
            .ok_or_else(|| SoAuthError::InvalidMessageFormat("malformed cache blob".to_string()))?;

        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|_| SoAuthError::InvalidMessageFormat("cache blob is not hex".to_string()))?;
        let nonce_bytes = hex::decode(nonce_hex)
            .map_err(|_| SoAuthError::InvalidMessageFormat("cache nonce is not hex".to_string()))?;
        let nonce: [u8; BOX_NONCE_BYTES] = nonce_bytes.try_into().map_err(|_| {
            SoAuthError::InvalidMessageFormat("cache nonce has wrong length".to_string())
        })?;

        let key = hash::digest_seed(&[secret.as_bytes()]);
        let plaintext = secretbox_decrypt(&ciphertext, &nonce, &key)?;

        serde_json::from_slice(&plaintext)
            .map_err(|_| SoAuthError::InvalidMessageFormat("cache content malformed".to_string()))
    }

    /// Encrypt and persist a credential.
    pub fn save(&self, secret: &str, credential: &StoredClientCredential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, Self::seal_blob(secret, credential)?)?;
        Ok(())
    }

    /// Load and decrypt the stored credential.
    ///
    /// `Ok(None)` when nothing is stored. An entry older than
    /// [`CACHE_TTL_HOURS`] is purged and reported as
    /// [`SoAuthError::CredentialCacheExpired`] - even when decryption
    /// succeeded.
    pub fn load(&self, secret: &str) -> Result<Option<StoredClientCredential>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let blob = std::fs::read_to_string(&self.path)?;
        let credential = match Self::open_blob(secret, &blob) {
            Ok(credential) => credential,
            Err(err) => {
                // Unreadable cache entries are garbage; drop them
                self.purge();
                return Err(err);
            }
        };

        if Utc::now() - credential.ts > Duration::hours(CACHE_TTL_HOURS) {
            self.purge();
            return Err(SoAuthError::CredentialCacheExpired);
        }

        Ok(Some(credential))
    }

    /// Remove the stored credential, if any.
    pub fn purge(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn credential(age_hours: i64) -> StoredClientCredential {
        StoredClientCredential {
            host_id: "self".to_string(),
            host_endpoint: "http://localhost:3000".to_string(),
            host_box_public_key: "aa".repeat(32),
            box_seed: "bb".repeat(32),
            token: "token-1".to_string(),
            meta: json!({"email": "a@x.com"}),
            ts: Utc::now() - Duration::hours(age_hours),
        }
    }

    fn cache_in(dir: &tempfile::TempDir) -> CredentialCache {
        CredentialCache::at(dir.path().join("soauth-test"))
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);

        cache.save("s3cret", &credential(0)).unwrap();
        let loaded = cache.load("s3cret").unwrap().unwrap();

        assert_eq!(loaded.token, "token-1");
        assert_eq!(loaded.meta, json!({"email": "a@x.com"}));
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cache_in(&dir).load("s3cret").unwrap().is_none());
    }

    #[test]
    fn test_wrong_secret_fails_and_purges() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);

        cache.save("s3cret", &credential(0)).unwrap();
        assert!(matches!(
            cache.load("wrong"),
            Err(SoAuthError::DecryptionFailed)
        ));
        assert!(!cache.path().exists());
    }

    #[test]
    fn test_expired_entry_purged_despite_valid_decryption() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);

        cache
            .save("s3cret", &credential(CACHE_TTL_HOURS + 1))
            .unwrap();
        assert!(matches!(
            cache.load("s3cret"),
            Err(SoAuthError::CredentialCacheExpired)
        ));
        assert!(!cache.path().exists());
    }

    #[test]
    fn test_fresh_entry_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);

        cache.save("s3cret", &credential(CACHE_TTL_HOURS - 1)).unwrap();
        assert!(cache.load("s3cret").unwrap().is_some());
    }

    #[test]
    fn test_tampered_blob_fails() {
        let blob = CredentialCache::seal_blob("s3cret", &credential(0)).unwrap();
        let mut tampered = blob.clone();
        tampered.replace_range(0..1, if blob.starts_with('0') { "1" } else { "0" });

        assert!(CredentialCache::open_blob("s3cret", &tampered).is_err());
    }

    #[test]
    fn test_purge_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        cache.purge();
        cache.purge();
    }
}

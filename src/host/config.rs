//! Host configuration.
//!
//! An explicit value injected into the negotiation and gateway layers -
//! never process-global state - so one process can run several
//! independent host identities (and tests can run dozens).

use std::time::Duration;

use crate::crypto::{derive_sign_keypair, MasterSecret, SignKeypair};
use crate::error::{Result, SoAuthError};

/// Default uniform pre-negotiation throttle
pub const DEFAULT_NEGOTIATION_DELAY: Duration = Duration::from_millis(250);

/// Immutable host-side configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    master_secret: MasterSecret,
    serves: Vec<String>,
    negotiation_delay: Duration,
}

impl HostConfig {
    /// Create a host configuration.
    ///
    /// The secret must be non-empty and at least one host id must be
    /// served.
    pub fn new(master_secret: MasterSecret, serves: Vec<String>) -> Result<Self> {
        if master_secret.as_bytes().is_empty() {
            return Err(SoAuthError::Config("Invalid secret format".to_string()));
        }
        if serves.is_empty() || serves.iter().any(|host_id| host_id.is_empty()) {
            return Err(SoAuthError::Config("Invalid serves format".to_string()));
        }

        Ok(Self {
            master_secret,
            serves,
            negotiation_delay: DEFAULT_NEGOTIATION_DELAY,
        })
    }

    /// Override the uniform pre-negotiation throttle (zero disables it)
    pub fn with_negotiation_delay(mut self, delay: Duration) -> Self {
        self.negotiation_delay = delay;
        self
    }

    /// The master secret
    pub fn master_secret(&self) -> &MasterSecret {
        &self.master_secret
    }

    /// Served host ids
    pub fn serves(&self) -> &[String] {
        &self.serves
    }

    /// Whether `host_id` is in the served set
    pub fn is_served(&self, host_id: &str) -> bool {
        self.serves.iter().any(|served| served == host_id)
    }

    /// The pre-negotiation throttle
    pub fn negotiation_delay(&self) -> Duration {
        self.negotiation_delay
    }

    /// Derive the signing keypair for a served host id.
    ///
    /// `None` when the id is not served; the keypair is rederived on
    /// demand and never stored.
    pub fn sign_keypair(&self, host_id: &str) -> Option<SignKeypair> {
        if !self.is_served(host_id) {
            return None;
        }
        Some(derive_sign_keypair(
            self.master_secret.as_bytes(),
            host_id.as_bytes(),
        ))
    }

    /// Log the signing public key for every served identity.
    ///
    /// These are the keys clients pin; operators distribute them out of
    /// band.
    pub fn announce_identities(&self) {
        for host_id in &self.serves {
            if let Some(keypair) = self.sign_keypair(host_id) {
                tracing::info!(
                    host_id = %host_id,
                    sign_public_key = %keypair.public_key().to_hex(),
                    "serving host identity"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(HostConfig::new(MasterSecret::from(""), vec!["self".to_string()]).is_err());
        assert!(HostConfig::new(MasterSecret::from("secret"), vec![]).is_err());
        assert!(HostConfig::new(MasterSecret::from("secret"), vec![String::new()]).is_err());
        assert!(HostConfig::new(MasterSecret::from("secret"), vec!["self".to_string()]).is_ok());
    }

    #[test]
    fn test_sign_keypair_only_for_served_ids() {
        let config = HostConfig::new(
            MasterSecret::from("secret"),
            vec!["host-a".to_string(), "host-b".to_string()],
        )
        .unwrap();

        assert!(config.sign_keypair("host-a").is_some());
        assert!(config.sign_keypair("host-c").is_none());
    }

    #[test]
    fn test_identities_are_distinct_and_stable() {
        let config = HostConfig::new(
            MasterSecret::from("secret"),
            vec!["host-a".to_string(), "host-b".to_string()],
        )
        .unwrap();

        let a = config.sign_keypair("host-a").unwrap().public_key();
        let b = config.sign_keypair("host-b").unwrap().public_key();
        assert_ne!(a, b);

        // Rederivation yields the same identity
        let again = config.sign_keypair("host-a").unwrap().public_key();
        assert_eq!(a, again);
    }
}

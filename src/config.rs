//! Process configuration.
//!
//! TOML config files with environment-variable overrides (`SOAUTH_*`).
//! The file carries everything a host process needs: master secret,
//! served identities, listen address, optional S2S clique and machine
//! peers.
//!
//! ```toml
//! [host]
//! secret = "change-me"
//! serves = ["self"]
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//!
//! [s2s]
//! name = "alpha"
//! passphrase = "clique-passphrase"
//! [s2s.peers]
//! beta = "c613...8a6e"
//!
//! [[machines]]
//! fingerprint = "build-bot"
//! host_id = "self"
//! public_key = "02a1...847c"
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::MasterSecret;
use crate::error::{Result, SoAuthError};
use crate::host::{HostConfig, MachineRegistry};
use crate::s2s::S2sChannel;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host identity configuration
    pub host: HostSection,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSection,

    /// S2S clique configuration
    #[serde(default)]
    pub s2s: Option<S2sSection>,

    /// Machine peers registered out of band
    #[serde(default)]
    pub machines: Vec<MachineEntry>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| SoAuthError::Config(format!("Failed to read config file: {e}")))?;

        let mut config: Config = toml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var("SOAUTH_SECRET") {
            self.host.secret = secret;
        }
        if let Ok(host) = std::env::var("SOAUTH_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SOAUTH_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
    }

    /// Build the immutable host configuration
    pub fn host_config(&self) -> Result<HostConfig> {
        Ok(HostConfig::new(
            MasterSecret::from(self.host.secret.as_str()),
            self.host.serves.clone(),
        )?
        .with_negotiation_delay(Duration::from_millis(self.host.negotiation_delay_ms)))
    }

    /// Build the machine registry from configured peers
    pub fn machine_registry(&self) -> Result<MachineRegistry> {
        let mut registry = MachineRegistry::new();
        for entry in &self.machines {
            registry.register(&entry.fingerprint, &entry.host_id, &entry.public_key)?;
        }
        Ok(registry)
    }

    /// Build the S2S channel, if one is configured
    pub fn s2s_channel(&self) -> Result<Option<S2sChannel>> {
        let Some(section) = &self.s2s else {
            return Ok(None);
        };

        let mut channel = S2sChannel::new(section.name.clone(), &section.passphrase);
        for (name, public_key) in &section.peers {
            channel = channel.with_peer(name.clone(), public_key)?;
        }
        Ok(Some(channel))
    }
}

/// Host identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSection {
    /// Master secret; root of all derivation. Override with `SOAUTH_SECRET`.
    pub secret: String,

    /// Host ids this process serves
    pub serves: Vec<String>,

    /// Uniform pre-negotiation throttle in milliseconds
    #[serde(default = "default_negotiation_delay_ms")]
    pub negotiation_delay_ms: u64,
}

fn default_negotiation_delay_ms() -> u64 {
    250
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerSection {
    /// Full listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// S2S clique configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S2sSection {
    /// This host's name on the clique
    pub name: String,

    /// Passphrase the S2S keypair derives from
    pub passphrase: String,

    /// Peer name to public key (hex)
    #[serde(default)]
    pub peers: HashMap<String, String>,
}

/// A machine peer registered out of band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineEntry {
    /// Fingerprint the peer presents
    pub fingerprint: String,

    /// Served host id the peer talks to
    pub host_id: String,

    /// Peer's box public key (hex)
    pub public_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [host]
            secret = "test-secret"
            serves = ["self", "partner"]

            [server]
            host = "0.0.0.0"
            port = 9090

            [s2s]
            name = "alpha"
            passphrase = "clique"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.host.secret, "test-secret");
        assert_eq!(config.host.serves.len(), 2);
        assert_eq!(config.host.negotiation_delay_ms, 250);
        assert_eq!(config.server.listen_addr(), "0.0.0.0:9090");
        assert_eq!(config.s2s.unwrap().name, "alpha");
    }

    #[test]
    fn test_default_server_section() {
        let toml = r#"
            [host]
            secret = "test-secret"
            serves = ["self"]
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.listen_addr(), "127.0.0.1:3000");
        assert!(config.s2s.is_none());
        assert!(config.machines.is_empty());
    }

    #[test]
    fn test_host_config_construction() {
        let toml = r#"
            [host]
            secret = "test-secret"
            serves = ["self"]
            negotiation_delay_ms = 0
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        let host = config.host_config().unwrap();
        assert!(host.is_served("self"));
        assert!(host.negotiation_delay().is_zero());
    }

    #[test]
    fn test_invalid_machine_key_rejected() {
        let toml = r#"
            [host]
            secret = "test-secret"
            serves = ["self"]

            [[machines]]
            fingerprint = "build-bot"
            host_id = "self"
            public_key = "not-a-key"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.machine_registry().is_err());
    }
}

//! Device fingerprint generation.
//!
//! A fingerprint binds a session to the client instance that negotiated
//! it. The browser original hashes rendering signals; a process derives
//! its fingerprint from stable environment signals instead. The host
//! never interprets the value - it only stores it at negotiation and
//! checks equality on every authenticated request.

use std::env;

use crate::crypto::hash;

/// Keyed-hash tag separating fingerprints from every other hash use
const FINGERPRINT_TAG: &[u8] = b"soauth/v1/fingerprint";

/// Derive a stable fingerprint for this process environment.
///
/// Keyed hash over OS, architecture, hostname, user, and home directory.
/// Stable across runs on the same machine and account; changes when the
/// environment does, which is exactly when re-negotiation should happen.
pub fn device_fingerprint() -> String {
    let hostname = env::var("HOSTNAME")
        .or_else(|_| env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string());
    let user = env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".to_string());
    let home = dirs::home_dir()
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_default();

    let signals = format!(
        "{};{};{};{};{}",
        env::consts::OS,
        env::consts::ARCH,
        hostname,
        user,
        home
    );

    hex::encode(hash::keyed(FINGERPRINT_TAG, signals.as_bytes()))
}

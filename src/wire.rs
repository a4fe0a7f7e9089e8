//! JSON wire envelopes and payload serialization.
//!
//! Everything SoAuth puts on the wire is JSON with camelCase fields and
//! hex-encoded byte strings. This module owns the envelope shapes only;
//! how their contents are produced and checked lives with the protocol
//! modules.
//!
//! # Envelopes
//!
//! | Envelope                | Shape                                         |
//! |-------------------------|-----------------------------------------------|
//! | Negotiation (direct)    | `{signature, signPublicKey}`                  |
//! | Negotiation (sealed)    | `{sealed, hostId}`                            |
//! | Negotiation response    | `{success, message, sealed?}`                 |
//! | Session request         | `{ciphertext, nonce, token}`                  |
//! | Session response        | `{ciphertext, nonce}`                         |
//! | Status / failure        | `{success, message}`                          |
//! | S2S                     | `{name, data: {ciphertext, nonce}}`           |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SoAuthError};

/// Request header carrying the device fingerprint
pub const FINGERPRINT_HEADER: &str = "soauth-fingerprint";

/// Body/query/path parameter name carrying a session token
pub const TOKEN_PARAM: &str = "soauth";

/// Negotiation purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intention {
    /// Create a new identity; fails if one already exists
    Register,
    /// Resume an existing identity; fails if none exists
    Login,
}

impl std::fmt::Display for Intention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intention::Register => write!(f, "register"),
            Intention::Login => write!(f, "login"),
        }
    }
}

/// The message a client signs during negotiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedNegotiation {
    /// Register or login
    pub intention: Intention,
    /// Which of the host's identities this negotiation targets
    pub host_id: String,
    /// Client's fresh session box public key (hex)
    pub box_public_key: String,
    /// The host signing key the client believes it is talking to (hex)
    pub server_sign_public_key: String,
    /// Free-form metadata stored on the access record
    #[serde(default)]
    pub meta: Value,
}

/// Direct negotiation request: combined signature plus the signing key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectNegotiateRequest {
    /// Hex combined envelope: signature ‖ signed message
    pub signature: String,
    /// Hex Ed25519 public key that produced the signature
    pub sign_public_key: String,
}

/// Sealed negotiation request: the direct request, sealed to the host's
/// signing identity so observers learn nothing about the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedNegotiateRequest {
    /// Hex anonymous seal over the serialized direct request
    pub sealed: String,
    /// Host identity to unseal under
    pub host_id: String,
}

/// Either accepted form of a negotiation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NegotiateRequest {
    /// Sealed variant
    Sealed(SealedNegotiateRequest),
    /// Direct variant
    Direct(DirectNegotiateRequest),
}

/// What the host seals back to the client on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostReply {
    /// Echoed intention; the client rejects a mismatch
    pub intention: Intention,
    /// Host's session box public key (hex)
    pub box_public_key: String,
    /// Fresh bearer token
    pub token: String,
}

/// Negotiation response envelope.
///
/// The reply payload is always sealed to the client's session box key;
/// failures carry only `success: false` plus an oracle-safe message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    /// Whether negotiation succeeded
    pub success: bool,
    /// Outcome message ("OK" or an oracle-safe failure)
    pub message: String,
    /// Hex seal over [`HostReply`], present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sealed: Option<String>,
}

impl NegotiateResponse {
    /// Successful response carrying a sealed reply
    pub fn sealed(sealed: String) -> Self {
        Self {
            success: true,
            message: "OK".to_string(),
            sealed: Some(sealed),
        }
    }

    /// Failure response with an oracle-safe message
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            sealed: None,
        }
    }
}

/// An encrypted payload: hex ciphertext plus hex nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherEnvelope {
    /// Hex ciphertext (includes auth tag)
    pub ciphertext: String,
    /// Hex 24-byte nonce
    pub nonce: String,
}

/// Authenticated session request: an envelope plus the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    /// The encrypted payload
    #[serde(flatten)]
    pub envelope: CipherEnvelope,
    /// Bearer token identifying the session
    pub token: String,
}

/// Generic status reply (logout confirmations, distinguished failures).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Outcome flag
    pub success: bool,
    /// Human-readable message
    pub message: String,
}

impl StatusResponse {
    /// Success with message
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Failure with message
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Server-to-server envelope: sender name plus encrypted payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S2sEnvelope {
    /// Sender identifier; the receiver looks up the matching public key
    pub name: String,
    /// The encrypted payload
    pub data: CipherEnvelope,
}

/// Serialize a payload value for encryption.
///
/// Objects and arrays become compact JSON text, strings pass through
/// unquoted, numbers become decimal text. Anything else is not a valid
/// SoAuth payload.
pub fn serialize_payload(payload: &Value) -> Result<String> {
    match payload {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Object(_) | Value::Array(_) => Ok(serde_json::to_string(payload)?),
        other => Err(SoAuthError::InvalidMessageFormat(format!(
            "Cannot serialize payload of type {other:?}"
        ))),
    }
}

/// Reverse of [`serialize_payload`], best effort.
///
/// Valid JSON parses back to its value; everything else is returned as a
/// raw string. Lossy by design - a plaintext that happens to be valid
/// JSON comes back parsed.
pub fn parse_payload(text: String) -> Value {
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_intention_wire_form() {
        assert_eq!(serde_json::to_string(&Intention::Register).unwrap(), "\"register\"");
        let parsed: Intention = serde_json::from_str("\"login\"").unwrap();
        assert_eq!(parsed, Intention::Login);
    }

    #[test]
    fn test_negotiate_request_parses_both_forms() {
        let direct: NegotiateRequest =
            serde_json::from_value(json!({"signature": "aabb", "signPublicKey": "ccdd"})).unwrap();
        assert!(matches!(direct, NegotiateRequest::Direct(_)));

        let sealed: NegotiateRequest =
            serde_json::from_value(json!({"sealed": "aabb", "hostId": "self"})).unwrap();
        assert!(matches!(sealed, NegotiateRequest::Sealed(_)));
    }

    #[test]
    fn test_session_request_wire_shape() {
        let request = SessionRequest {
            envelope: CipherEnvelope {
                ciphertext: "aa".to_string(),
                nonce: "bb".to_string(),
            },
            token: "tok".to_string(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"ciphertext": "aa", "nonce": "bb", "token": "tok"}));
    }

    #[test]
    fn test_failure_response_omits_sealed() {
        let value = serde_json::to_value(NegotiateResponse::failure("Invalid request")).unwrap();
        assert_eq!(value, json!({"success": false, "message": "Invalid request"}));
    }

    #[test]
    fn test_serialize_payload_shapes() {
        assert_eq!(serialize_payload(&json!("hello")).unwrap(), "hello");
        assert_eq!(serialize_payload(&json!(42)).unwrap(), "42");
        assert_eq!(serialize_payload(&json!({"a": 1})).unwrap(), r#"{"a":1}"#);
        assert!(serialize_payload(&Value::Null).is_err());
        assert!(serialize_payload(&json!(true)).is_err());
    }

    #[test]
    fn test_parse_payload_best_effort() {
        assert_eq!(parse_payload(r#"{"a":1}"#.to_string()), json!({"a": 1}));
        assert_eq!(parse_payload("42".to_string()), json!(42));
        assert_eq!(parse_payload("not json".to_string()), json!("not json"));
    }

    #[test]
    fn test_signed_negotiation_defaults_meta() {
        let message: SignedNegotiation = serde_json::from_value(json!({
            "intention": "register",
            "hostId": "self",
            "boxPublicKey": "aa",
            "serverSignPublicKey": "bb"
        }))
        .unwrap();
        assert!(message.meta.is_null());
    }
}

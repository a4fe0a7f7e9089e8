//! HTTP request handlers.
//!
//! Failure responses carry oracle-safe messages only
//! ([`SoAuthError::wire_message`]); internal faults log the full chain
//! and surface as a bare 500.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{any, get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::state::AppState;
use crate::error::SoAuthError;
use crate::store::AccessStore;
use crate::wire::{
    CipherEnvelope, NegotiateRequest, NegotiateResponse, SessionRequest, StatusResponse,
    FINGERPRINT_HEADER, TOKEN_PARAM,
};

/// Create the API router.
///
/// `/message` and `/machine` are demo application routes showing the
/// authorize-decrypt-reply pattern; real deployments mount their own
/// routes against [`AppState::gateway`].
pub fn create_router<S: AccessStore + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        // Health and status
        .route("/health", get(health_check))
        .route("/status", get(status::<S>))
        // Negotiation, verification, logout
        .route("/soauth", post(negotiate::<S>))
        .route("/soauth/verify", get(verify::<S>))
        .route("/soauth/logout/:token", any(logout::<S>))
        // Demo application routes
        .route("/message", post(message::<S>))
        .route("/machine", post(machine::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn fingerprint_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(FINGERPRINT_HEADER).and_then(|v| v.to_str().ok())
}

/// Map a protocol error to its wire response.
fn failure_response(err: &SoAuthError) -> (StatusCode, Json<StatusResponse>) {
    if err.is_internal() {
        tracing::error!(error = %err, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse::failure(err.wire_message())),
        )
    } else {
        tracing::debug!(error = %err, "request rejected");
        (StatusCode::OK, Json(StatusResponse::failure(err.wire_message())))
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Status endpoint: served identities and their pinned keys
async fn status<S: AccessStore>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    let identities: Vec<_> = state
        .host
        .serves()
        .iter()
        .filter_map(|host_id| {
            state.host.sign_keypair(host_id).map(|keypair| {
                serde_json::json!({
                    "hostId": host_id,
                    "signPublicKey": keypair.public_key().to_hex(),
                })
            })
        })
        .collect();

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.uptime().as_secs(),
        "serves": identities,
    }))
}

/// Negotiation endpoint
async fn negotiate<S: AccessStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(request): Json<NegotiateRequest>,
) -> impl IntoResponse {
    let fingerprint = fingerprint_header(&headers);

    match state.negotiator().probe(&request, fingerprint).await {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(err) => {
            let (code, Json(body)) = failure_response(&err);
            (code, Json(NegotiateResponse::failure(body.message)))
        }
    }
}

/// Token verification endpoint: `?soauth=<token>`.
///
/// The `soauth` query parameter is equivalent to the token carried in a
/// session request body; this route answers whether it still resolves.
async fn verify<S: AccessStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(token) = params.get(TOKEN_PARAM) else {
        return (
            StatusCode::OK,
            Json(StatusResponse::failure("Insufficient parameter received.")),
        );
    };

    match state.gateway().resolve(token).await {
        Ok(Some(_)) => (StatusCode::OK, Json(StatusResponse::ok("OK"))),
        Ok(None) => (
            StatusCode::OK,
            Json(StatusResponse::failure(
                SoAuthError::TokenNotFound.wire_message(),
            )),
        ),
        Err(err) => failure_response(&err),
    }
}

/// Logout endpoint; idempotent
async fn logout<S: AccessStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    match state.gateway().logout(&token).await {
        Ok(true) => (StatusCode::OK, Json(StatusResponse::ok("OK"))),
        Ok(false) => (
            StatusCode::OK,
            Json(StatusResponse::ok("Session not found. Already logged out.")),
        ),
        Err(err) => failure_response(&err),
    }
}

/// Demo exchange route: echo the decrypted payload back, encrypted.
async fn message<S: AccessStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(request): Json<SessionRequest>,
) -> axum::response::Response {
    let gateway = state.gateway();

    let exchange = match gateway.authorize(&request, fingerprint_header(&headers)).await {
        Ok(exchange) => exchange,
        Err(err) => return failure_response(&err).into_response(),
    };

    match gateway.reply(&exchange.access, &exchange.payload) {
        Ok(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
        Err(err) => failure_response(&err).into_response(),
    }
}

/// Demo machine route: echo over the static channel selected by the
/// fingerprint header.
async fn machine<S: AccessStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(envelope): Json<CipherEnvelope>,
) -> axum::response::Response {
    let Some(fingerprint) = fingerprint_header(&headers) else {
        return (
            StatusCode::OK,
            Json(StatusResponse::failure("Insufficient parameter received.")),
        )
            .into_response();
    };

    let channel = match state.machines.channel_for(state.host.master_secret(), fingerprint) {
        Ok(channel) => channel,
        Err(err) => return failure_response(&err).into_response(),
    };

    let reply = channel
        .decrypt(&envelope)
        .and_then(|payload| channel.encrypt(&payload));

    match reply {
        Ok(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
        Err(err) => failure_response(&err).into_response(),
    }
}

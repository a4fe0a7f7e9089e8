//! SoAuth HTTP server.
//!
//! An axum router over the host-side protocol:
//!
//! - `POST /soauth` - negotiation (direct or sealed request)
//! - `ALL /soauth/logout/:token` - idempotent logout
//! - `POST /message` - demo authorized exchange (echo)
//! - `POST /machine` - demo machine channel (echo)
//! - `GET /health`, `GET /status`
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use soauth::server::{create_router, AppState};
//!
//! let state = Arc::new(AppState::new(host_config, store));
//! let router = create_router(state);
//! axum::serve(listener, router).await?;
//! ```

mod handlers;
mod state;

pub use handlers::{create_router, health_check};
pub use state::AppState;

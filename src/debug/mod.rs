//! Developer diagnostics.
//!
//! Shows how ids map onto store keys: which candidates were probed, what
//! each held, and which one a normal lookup returns. Guarded by a bearer
//! token and mounted only when `debug.enabled` is set at startup.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use crate::http::server::AppState;
use self::auth::debug_auth_middleware;
use self::handlers::*;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/debug/status", get(get_status))
        .route("/debug/probe/{id}", get(get_probe))
        .route("/debug/keys", get(get_keys))
        .route_layer(middleware::from_fn_with_state(state, debug_auth_middleware))
}

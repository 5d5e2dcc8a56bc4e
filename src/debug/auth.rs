use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;

/// Require `Authorization: Bearer <debug.api_key>`.
///
/// Answers 404 once a reload has switched the debug surface off.
pub async fn debug_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let settings = state.settings();
    if !settings.debug.enabled {
        return Err(StatusCode::NOT_FOUND);
    }

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match token {
        Some(token) if !settings.debug.api_key.is_empty() && token == settings.debug.api_key => {
            Ok(next.run(request).await)
        }
        _ => {
            tracing::warn!("Rejected debug request with missing or wrong token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

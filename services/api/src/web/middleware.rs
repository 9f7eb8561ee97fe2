//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::web::state::AppState;

/// Middleware that validates the session cookie and resolves the caller into
/// a chat participant.
///
/// If valid, inserts the `Participant` into request extensions for handlers
/// to use. If invalid or missing, returns 401 Unauthorized.
pub async fn require_participant(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract cookie header
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Parse session ID from cookie
    let session_token = cookie_header
        .split(';')
        .find_map(|c| {
            let c = c.trim();
            c.strip_prefix("session=")
        })
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 3. Resolve the token into a participant
    let participant = state
        .identity
        .resolve_token(session_token)
        .await
        .map_err(|e| {
            debug!("Failed to resolve session token: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    // 4. Insert the participant into request extensions
    req.extensions_mut().insert(participant);

    // 5. Continue to the handler
    Ok(next.run(req).await)
}

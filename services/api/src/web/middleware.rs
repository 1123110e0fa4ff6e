//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use santri_core::PortError;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Extracts the `session` cookie value from the request headers.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

/// Middleware that validates the auth session cookie and loads the caller.
///
/// If valid, inserts the `User` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Parse session ID from cookie
    let auth_session_id = session_cookie(req.headers()).ok_or(ApiError::Unauthenticated)?;

    // 2. Validate auth session in database, get user_id
    let user_id = state
        .db
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized | PortError::NotFound(_) => {
                debug!("Rejected auth session");
                ApiError::Unauthenticated
            }
            other => ApiError::Port(other),
        })?;

    // 3. Load the caller with their current role; roles are never cached.
    let user = state.db.get_user_by_id(user_id).await.map_err(|e| match e {
        PortError::NotFound(_) => ApiError::Unauthenticated,
        other => ApiError::Port(other),
    })?;

    // 4. Insert the user into request extensions and continue to the handler
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it to a live
//! session, and injects `AuthContext` into request extensions for
//! downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::crypto::hash_token;
use crate::db::{self, SessionRecord};

/// The bearer token presented on the request, if any.
pub(crate) fn bearer_token(req: &Request<axum::body::Body>) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Look up an unexpired session by token hash.
pub(crate) fn live_session(
    ctx: &ApiContext,
    token_hash: &str,
) -> Result<Option<SessionRecord>, ApiError> {
    let conn = ctx.core.open_db()?;
    match db::find_session(&conn, token_hash)? {
        Some(s) if s.expires_at > chrono::Utc::now() => Ok(Some(s)),
        Some(_) => {
            tracing::debug!("Expired session presented");
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Require a valid bearer token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
/// On success: injects `AuthContext` and marks the response `no-store`.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    // 1. Extract bearer token
    let token = bearer_token(&req).ok_or(ApiError::Unauthorized)?.to_string();

    // 2. Resolve session (connection dropped before any .await)
    let token_hash = hash_token(&ctx.core.config.token_secret, &token);
    let session = live_session(&ctx, &token_hash)?.ok_or(ApiError::TokenInvalid)?;

    // 3. Inject auth context for downstream handlers
    req.extensions_mut().insert(AuthContext {
        user_id: session.user_id,
        role: session.role,
        token_hash,
    });

    // 4. Process request
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));

    Ok(response)
}

//! Audit logging middleware.
//!
//! Logs every API request with method, path, status, latency and the
//! caller's user_id. Runs innermost (after auth has injected AuthContext).

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::AuthContext;

/// Log API access for the audit trail.
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let user_id = req
        .extensions()
        .get::<AuthContext>()
        .map(|a| a.user_id.to_string());

    let started = Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match user_id {
        Some(user_id) => {
            tracing::info!(%method, %path, status, elapsed_ms, %user_id, "API access")
        }
        None => tracing::info!(%method, %path, status, elapsed_ms, "API access"),
    }

    response
}

//! HTTP API router.
//!
//! Returns a composable `Router` with every route under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Rate limiter → 2. Auth validator → 3. Audit logger

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers run bottom-up: Extension → Rate limit → Auth → Audit → Handler.
    // Path params use `:param` syntax (axum 0.7).
    let protected = Router::new()
        .route("/logout", post(endpoints::accounts::logout))
        .route(
            "/profile",
            get(endpoints::profile::get_profile).put(endpoints::profile::update_profile),
        )
        .route(
            "/entries",
            get(endpoints::entries::list).post(endpoints::entries::upsert_entry),
        )
        .route("/entries/today", get(endpoints::entries::today))
        .route(
            "/courses",
            get(endpoints::courses::list_courses).post(endpoints::courses::create_course),
        )
        .route(
            "/courses/:course_id",
            get(endpoints::courses::get_course)
                .put(endpoints::courses::update_course)
                .delete(endpoints::courses::delete_course),
        )
        .route(
            "/courses/:course_id/medications",
            post(endpoints::courses::add_medication),
        )
        .route(
            "/courses/:course_id/medications/:med_id",
            put(endpoints::courses::update_medication)
                .delete(endpoints::courses::delete_medication),
        )
        .route(
            "/patients",
            get(endpoints::patients::list_patients).post(endpoints::patients::create_patient),
        )
        .route("/patients/:patient_id", get(endpoints::patients::get_patient))
        .route(
            "/patients/:patient_id/entries",
            get(endpoints::patients::patient_entries),
        )
        .route(
            "/chat",
            get(endpoints::chat::get_messages).post(endpoints::chat::send_message),
        )
        .route("/insight/today", get(endpoints::insight::today))
        .route("/analytics", get(endpoints::analytics::analyze))
        .route("/report/:course_id", get(endpoints::report::course_report))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    // Rate-limited only, no auth required
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/register", post(endpoints::accounts::register))
        .route("/login", post(endpoints::accounts::login))
        .route("/forgot-password", post(endpoints::accounts::forgot_password))
        .route("/reset-password", post(endpoints::accounts::reset_password))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
}

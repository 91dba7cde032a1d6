//! `GET /api/analytics`: AI correlation analysis over the whole history.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use crate::ai::{self, AnalyticsRecord};
use crate::api::error::ApiError;
use crate::api::extract::run_blocking;
use crate::api::types::{ApiContext, AuthContext};
use crate::db;

pub const MIN_ANALYTICS_ENTRIES: usize = 3;
pub const INSUFFICIENT_DATA_TEXT: &str =
    "Not enough data for analysis yet. Please add at least 3 entries about how you feel.";

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub insights: String,
}

pub async fn analyze(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let entries = {
        let conn = ctx.core.open_db()?;
        db::list_entries_chronological(&conn, &auth.user_id)?
    };

    if entries.len() < MIN_ANALYTICS_ENTRIES {
        return Ok(Json(AnalyticsResponse {
            insights: INSUFFICIENT_DATA_TEXT.into(),
        }));
    }

    let records: Vec<AnalyticsRecord> = entries.iter().map(AnalyticsRecord::from).collect();
    let prompt = ai::build_analytics_prompt(&records);

    let llm = ctx.core.llm.clone();
    let model = ctx.core.config.insight_model.clone();
    let raw = run_blocking(move || ai::generate_logged(llm.as_ref(), &model, &prompt))
        .await?
        .map_err(|e| ApiError::Internal(format!("analytics generation failed: {e}")))?;

    let insights = ai::normalize_bullets(&ai::sanitize_ai_text(&raw));
    if insights.is_empty() {
        return Err(ApiError::Internal("analytics generation returned no text".into()));
    }

    tracing::info!(user_id = %auth.user_id, entries = entries.len(), "Analytics generated");
    Ok(Json(AnalyticsResponse { insights }))
}

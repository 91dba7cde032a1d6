//! `GET /api/insight/today`: daily motivational line or health fact.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;

use crate::adherence::{self, Achievement};
use crate::ai;
use crate::api::error::ApiError;
use crate::api::extract::run_blocking;
use crate::api::types::{ApiContext, AuthContext};
use crate::db;
use crate::validation;

pub const START_LOGGING_TEXT: &str =
    "Start logging your days to get personalised insights!";
pub const FALLBACK_TIP: &str =
    "Drink more water: it improves how you feel and how well you concentrate!";

/// Entries the achievement check and the prompt look at.
const INSIGHT_WINDOW: usize = 7;
/// Entries loaded for the streak counters.
const STREAK_WINDOW: u32 = 365;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievement: Option<Achievement>,
    pub adherence_streak: u32,
    pub logging_streak: u32,
}

pub async fn today(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    let history = {
        let conn = ctx.core.open_db()?;
        db::list_recent_entries(&conn, &auth.user_id, STREAK_WINDOW)?
    };

    if history.is_empty() {
        return Ok(Json(InsightResponse {
            text: START_LOGGING_TEXT.into(),
            achievement: None,
            adherence_streak: 0,
            logging_streak: 0,
        })
        .into_response());
    }

    let today = validation::local_day(&Utc::now());
    let recent = &history[..history.len().min(INSIGHT_WINDOW)];
    let achievement = adherence::detect_achievement(recent, today);
    let adherence_streak = adherence::adherence_streak(&history, today);
    let logging_streak = adherence::logging_streak(&history, today);

    let prompt = match achievement {
        Some(a) => ai::build_achievement_prompt(a),
        None => ai::build_health_fact_prompt(recent),
    };

    let llm = ctx.core.llm.clone();
    let model = ctx.core.config.insight_model.clone();
    let generated = run_blocking(move || ai::generate_logged(llm.as_ref(), &model, &prompt)).await?;

    let text = generated
        .map(|raw| ai::sanitize_ai_text(&raw))
        .and_then(|t| if t.is_empty() { Err(ai::AiError::EmptyResponse) } else { Ok(t) });

    match text {
        Ok(text) => Ok(Json(InsightResponse {
            text,
            achievement,
            adherence_streak,
            logging_streak,
        })
        .into_response()),
        Err(e) => {
            tracing::warn!(user_id = %auth.user_id, error = %e, "Insight fell back to default tip");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(InsightResponse {
                    text: FALLBACK_TIP.into(),
                    achievement,
                    adherence_streak,
                    logging_streak,
                }),
            )
                .into_response())
        }
    }
}

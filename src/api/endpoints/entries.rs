//! Daily health entry endpoints.
//!
//! - `POST /api/entries`: create or replace today's (or `entryDate`'s) entry
//! - `GET /api/entries/today`: today's medication checklist
//! - `GET /api/entries?limit=n`: recent entries, newest first

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::extract::{parse_id, JsonBody};
use crate::api::types::{ApiContext, AuthContext};
use crate::db;
use crate::models::{DoseRecord, HealthEntry, MedicationCheck};
use crate::validation;

pub const DEFAULT_ENTRY_LIMIT: u32 = 30;
pub const MAX_ENTRY_LIMIT: u32 = 365;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryRequest {
    pub entry_date: Option<String>,
    pub course_id: Option<String>,
    pub medications: Vec<MedicationCheck>,
    pub medications_taken: Vec<DoseRecord>,
    pub symptoms: Vec<String>,
    #[serde(alias = "headacheLevel")]
    pub symptom_level: Option<i64>,
    pub symptom_tags: Vec<String>,
    pub lifestyle_tags: Vec<String>,
    pub notes: Option<String>,
}

/// `POST /api/entries`: one entry per local day, later posts replace it.
pub async fn upsert_entry(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(req): JsonBody<EntryRequest>,
) -> Result<(StatusCode, Json<HealthEntry>), ApiError> {
    let symptom_level =
        validation::validate_symptom_level(req.symptom_level).map_err(ApiError::BadRequest)?;
    let entry_date = match req.entry_date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(raw) => validation::parse_timestamp("entryDate", raw).map_err(ApiError::BadRequest)?,
        None => Utc::now(),
    };

    let conn = ctx.core.open_db()?;

    let course_id = match req.course_id.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(raw) => {
            let course_id = parse_id(raw, "course")?;
            let course = db::get_course(&conn, &course_id)?
                .ok_or_else(|| ApiError::NotFound("course not found".into()))?;
            if course.patient_id != auth.user_id {
                return Err(ApiError::Forbidden("course belongs to another patient".into()));
            }
            Some(course_id)
        }
        None => None,
    };

    let entry = HealthEntry {
        id: Uuid::new_v4(),
        user_id: auth.user_id,
        entry_date,
        entry_day: validation::local_day(&entry_date),
        course_id,
        medications: req.medications,
        medications_taken: req.medications_taken,
        symptoms: req.symptoms,
        symptom_level,
        symptom_tags: req.symptom_tags,
        lifestyle_tags: req.lifestyle_tags,
        notes: validation::normalize_notes(req.notes),
    };

    let stored = db::upsert_entry(&conn, &entry)?;
    tracing::info!(
        user_id = %auth.user_id,
        entry_id = %stored.id,
        day = %stored.entry_day,
        "Health entry saved"
    );

    Ok((StatusCode::CREATED, Json(stored)))
}

/// `GET /api/entries/today`: the bare checklist array.
pub async fn today(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<MedicationCheck>>, ApiError> {
    let today = validation::local_day(&Utc::now());
    let conn = ctx.core.open_db()?;
    let entry = db::find_entry_for_day(&conn, &auth.user_id, &today)?
        .ok_or_else(|| ApiError::NotFound("no entry for today".into()))?;
    Ok(Json(entry.medications))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
}

/// Requested page size, defaulted and capped.
pub(crate) fn entry_limit(raw: Option<&str>) -> Result<u32, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_ENTRY_LIMIT),
        Some(s) => s
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .map(|n| n.min(MAX_ENTRY_LIMIT))
            .ok_or_else(|| ApiError::BadRequest(format!("invalid limit: {s}"))),
    }
}

#[derive(Serialize)]
pub struct EntryListResponse {
    pub entries: Vec<HealthEntry>,
}

/// `GET /api/entries`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<EntryListResponse>, ApiError> {
    let limit = entry_limit(query.limit.as_deref())?;
    let conn = ctx.core.open_db()?;
    let entries = db::list_recent_entries(&conn, &auth.user_id, limit)?;
    Ok(Json(EntryListResponse { entries }))
}

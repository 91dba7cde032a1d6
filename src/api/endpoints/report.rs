//! `GET /api/report/:courseId`: course statistics plus an AI summary.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::courses::load_course;
use crate::adherence::{self, SymptomPoint};
use crate::ai;
use crate::api::error::ApiError;
use crate::api::extract::run_blocking;
use crate::api::types::{ApiContext, AuthContext};
use crate::db;
use crate::validation;

pub const AI_UNAVAILABLE_TEXT: &str = "AI analysis could not be generated";

#[derive(Debug, Serialize)]
pub struct MedicationSummary {
    pub name: String,
    pub dosage: String,
    pub schedule: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatistics {
    pub compliance_percent: u8,
    pub total_entries: usize,
    pub symptom_levels: Vec<SymptomPoint>,
    pub adherence_streak: u32,
    pub medications_list: Vec<MedicationSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCourse {
    pub name: String,
    pub main_symptom: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub statistics: ReportStatistics,
    pub ai_summary: Map<String, Value>,
    pub course: ReportCourse,
}

/// Parsed JSON object, else the raw text, else the error marker.
fn summarize(generated: Result<String, ai::AiError>) -> Map<String, Value> {
    let fallback = |value: Value| match value {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    match generated {
        Ok(text) => ai::extract_json_object(&text)
            .unwrap_or_else(|| fallback(json!({ "rawText": text }))),
        Err(_) => fallback(json!({ "error": AI_UNAVAILABLE_TEXT })),
    }
}

pub async fn course_report(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(course_id): Path<String>,
) -> Result<Json<ReportResponse>, ApiError> {
    let (patient, course, medications, entries) = {
        let conn = ctx.core.open_db()?;
        let course = load_course(&conn, &auth, &course_id)?;
        let patient = db::get_user(&conn, &course.patient_id)?
            .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
        let medications = db::list_medications_for_course(&conn, &course.id)?;
        let entries = db::list_course_entries(&conn, &course.patient_id, &course.id)?;
        (patient, course, medications, entries)
    };

    let prompt = ai::build_report_prompt(&patient.medical_card, &course, &medications, &entries);
    let llm = ctx.core.llm.clone();
    let model = ctx.core.config.report_model.clone();
    let generated = run_blocking(move || ai::generate_logged(llm.as_ref(), &model, &prompt)).await?;
    if let Err(e) = &generated {
        tracing::warn!(course_id = %course.id, error = %e, "Report summary unavailable");
    }

    let today = validation::local_day(&Utc::now());
    let statistics = ReportStatistics {
        compliance_percent: adherence::compliance_percent(&entries),
        total_entries: entries.len(),
        symptom_levels: adherence::symptom_series(&entries),
        adherence_streak: adherence::adherence_streak(&entries, today),
        medications_list: medications
            .into_iter()
            .map(|m| MedicationSummary {
                name: m.name,
                dosage: m.dosage,
                schedule: m.schedule,
            })
            .collect(),
    };

    tracing::info!(
        user_id = %auth.user_id,
        course_id = %course.id,
        entries = statistics.total_entries,
        "Course report generated"
    );

    Ok(Json(ReportResponse {
        statistics,
        ai_summary: summarize(generated),
        course: ReportCourse {
            name: course.name,
            main_symptom: course.main_symptom,
            start_date: course.start_date,
            end_date: course.end_date,
        },
    }))
}

//! Treatment course and course medication endpoints.
//!
//! - `POST /api/courses`, `GET /api/courses`
//! - `GET|PUT|DELETE /api/courses/:courseId`
//! - `POST /api/courses/:courseId/medications`
//! - `PUT|DELETE /api/courses/:courseId/medications/:medId`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{message, MessageResponse};
use crate::api::error::ApiError;
use crate::api::extract::{parse_id, required, JsonBody};
use crate::api::types::{ApiContext, AuthContext};
use crate::db;
use crate::models::{Medication, TreatmentCourse};
use crate::validation;

// ── Access ──────────────────────────────────────────────

/// Load a course the caller may see and change.
///
/// Allowed: the patient it belongs to, the doctor recorded on it, and the
/// doctor the patient is assigned to. Unknown ids are 404, everyone else 403.
pub(crate) fn load_course(
    conn: &Connection,
    auth: &AuthContext,
    raw_id: &str,
) -> Result<TreatmentCourse, ApiError> {
    let course_id = parse_id(raw_id, "course")?;
    let course = db::get_course(conn, &course_id)?
        .ok_or_else(|| ApiError::NotFound("course not found".into()))?;

    if course.patient_id == auth.user_id || course.doctor_id == Some(auth.user_id) {
        return Ok(course);
    }
    if auth.is_doctor()
        && db::get_assigned_patient(conn, &auth.user_id, &course.patient_id)?.is_some()
    {
        return Ok(course);
    }

    tracing::warn!(user_id = %auth.user_id, course_id = %course.id, "Course access denied");
    Err(ApiError::Forbidden("access to this course is denied".into()))
}

/// Whose courses a request targets: the caller, or a doctor's assigned patient.
fn target_patient(
    conn: &Connection,
    auth: &AuthContext,
    patient_id: Option<&str>,
) -> Result<(Uuid, Option<Uuid>), ApiError> {
    let Some(raw) = patient_id.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok((auth.user_id, None));
    };
    let patient_id = parse_id(raw, "patient")?;
    if patient_id == auth.user_id {
        return Ok((auth.user_id, None));
    }
    if !auth.is_doctor() {
        return Err(ApiError::Forbidden("only doctors may act for a patient".into()));
    }
    db::get_assigned_patient(conn, &auth.user_id, &patient_id)?
        .ok_or_else(|| ApiError::NotFound("patient not found".into()))?;
    Ok((patient_id, Some(auth.user_id)))
}

fn optional_date(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => validation::parse_timestamp(field, raw)
            .map(Some)
            .map_err(ApiError::BadRequest),
        None => Ok(None),
    }
}

fn check_period(course: &TreatmentCourse) -> Result<(), ApiError> {
    match course.end_date {
        Some(end) if end < course.start_date => Err(ApiError::BadRequest(
            "endDate must not be before startDate".into(),
        )),
        _ => Ok(()),
    }
}

/// Trimmed, non-blank schedule times.
fn clean_schedule(schedule: Vec<String>) -> Vec<String> {
    schedule
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ── Courses ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseRequest {
    pub name: Option<String>,
    pub main_symptom: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub patient_id: Option<String>,
}

/// `POST /api/courses`
pub async fn create_course(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(req): JsonBody<CourseRequest>,
) -> Result<(StatusCode, Json<TreatmentCourse>), ApiError> {
    let (Some(name), Some(main_symptom)) = (non_blank(req.name), non_blank(req.main_symptom))
    else {
        return Err(ApiError::BadRequest("name and mainSymptom are required".into()));
    };
    let start_date = optional_date("startDate", req.start_date.as_deref())?.unwrap_or_else(Utc::now);
    let end_date = optional_date("endDate", req.end_date.as_deref())?;

    let conn = ctx.core.open_db()?;
    let (patient_id, doctor_id) = target_patient(&conn, &auth, req.patient_id.as_deref())?;

    let course = TreatmentCourse {
        id: Uuid::new_v4(),
        patient_id,
        doctor_id,
        name,
        main_symptom,
        start_date,
        end_date,
    };
    check_period(&course)?;
    db::insert_course(&conn, &course)?;

    tracing::info!(
        user_id = %auth.user_id,
        course_id = %course.id,
        patient_id = %course.patient_id,
        "Course created"
    );
    Ok((StatusCode::CREATED, Json(course)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseListQuery {
    pub patient_id: Option<String>,
}

/// `GET /api/courses`: newest start first.
pub async fn list_courses(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<CourseListQuery>,
) -> Result<Json<Vec<TreatmentCourse>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let (patient_id, _) = target_patient(&conn, &auth, query.patient_id.as_deref())?;
    Ok(Json(db::list_courses_for_patient(&conn, &patient_id)?))
}

#[derive(Serialize)]
pub struct CourseDetail {
    pub course: TreatmentCourse,
    pub medications: Vec<Medication>,
}

/// `GET /api/courses/:courseId`
pub async fn get_course(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseDetail>, ApiError> {
    let conn = ctx.core.open_db()?;
    let course = load_course(&conn, &auth, &course_id)?;
    let medications = db::list_medications_for_course(&conn, &course.id)?;
    Ok(Json(CourseDetail {
        course,
        medications,
    }))
}

/// `PUT /api/courses/:courseId`: only non-empty fields are applied.
pub async fn update_course(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(course_id): Path<String>,
    JsonBody(req): JsonBody<CourseRequest>,
) -> Result<Json<TreatmentCourse>, ApiError> {
    let start_date = optional_date("startDate", req.start_date.as_deref())?;
    let end_date = optional_date("endDate", req.end_date.as_deref())?;

    let conn = ctx.core.open_db()?;
    let mut course = load_course(&conn, &auth, &course_id)?;

    if let Some(name) = non_blank(req.name) {
        course.name = name;
    }
    if let Some(main_symptom) = non_blank(req.main_symptom) {
        course.main_symptom = main_symptom;
    }
    if let Some(start) = start_date {
        course.start_date = start;
    }
    if end_date.is_some() {
        course.end_date = end_date;
    }
    check_period(&course)?;

    db::update_course(&conn, &course)?;
    tracing::info!(user_id = %auth.user_id, course_id = %course.id, "Course updated");
    Ok(Json(course))
}

/// `DELETE /api/courses/:courseId`: medications go with it.
pub async fn delete_course(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(course_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let course = load_course(&conn, &auth, &course_id)?;
    if !db::delete_course(&conn, &course.id)? {
        return Err(ApiError::NotFound("course not found".into()));
    }
    tracing::info!(user_id = %auth.user_id, course_id = %course.id, "Course deleted");
    Ok(message("course deleted"))
}

// ── Medications ─────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MedicationRequest {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub schedule: Option<Vec<String>>,
}

/// `POST /api/courses/:courseId/medications`
pub async fn add_medication(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(course_id): Path<String>,
    JsonBody(req): JsonBody<MedicationRequest>,
) -> Result<(StatusCode, Json<Medication>), ApiError> {
    let missing = || ApiError::BadRequest("name, dosage and schedule are required".into());
    let name = required(req.name, "name").map_err(|_| missing())?;
    let dosage = required(req.dosage, "dosage").map_err(|_| missing())?;
    let schedule = clean_schedule(req.schedule.unwrap_or_default());
    if schedule.is_empty() {
        return Err(missing());
    }

    let conn = ctx.core.open_db()?;
    let course = load_course(&conn, &auth, &course_id)?;

    let medication = Medication {
        id: Uuid::new_v4(),
        course_id: course.id,
        name,
        dosage,
        schedule,
    };
    db::insert_medication(&conn, &medication)?;

    tracing::info!(course_id = %course.id, med_id = %medication.id, "Medication added");
    Ok((StatusCode::CREATED, Json(medication)))
}

fn load_medication(
    conn: &Connection,
    course: &TreatmentCourse,
    raw_id: &str,
) -> Result<Medication, ApiError> {
    let med_id = parse_id(raw_id, "medication")?;
    db::get_course_medication(conn, &course.id, &med_id)?
        .ok_or_else(|| ApiError::NotFound("medication not found".into()))
}

/// `PUT /api/courses/:courseId/medications/:medId`
pub async fn update_medication(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path((course_id, med_id)): Path<(String, String)>,
    JsonBody(req): JsonBody<MedicationRequest>,
) -> Result<Json<Medication>, ApiError> {
    let conn = ctx.core.open_db()?;
    let course = load_course(&conn, &auth, &course_id)?;
    let mut medication = load_medication(&conn, &course, &med_id)?;

    if let Some(name) = non_blank(req.name) {
        medication.name = name;
    }
    if let Some(dosage) = non_blank(req.dosage) {
        medication.dosage = dosage;
    }
    let schedule = clean_schedule(req.schedule.unwrap_or_default());
    if !schedule.is_empty() {
        medication.schedule = schedule;
    }

    db::update_medication(&conn, &medication)?;
    tracing::info!(course_id = %course.id, med_id = %medication.id, "Medication updated");
    Ok(Json(medication))
}

/// `DELETE /api/courses/:courseId/medications/:medId`
pub async fn delete_medication(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path((course_id, med_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let course = load_course(&conn, &auth, &course_id)?;
    let med_id = parse_id(&med_id, "medication")?;
    if !db::delete_course_medication(&conn, &course.id, &med_id)? {
        return Err(ApiError::NotFound("medication not found".into()));
    }
    tracing::info!(course_id = %course.id, %med_id, "Medication deleted");
    Ok(message("medication deleted"))
}

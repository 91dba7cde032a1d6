//! Doctor roster endpoints. Every route is doctor-only.
//!
//! - `GET /api/patients`
//! - `POST /api/patients`
//! - `GET /api/patients/:patientId`
//! - `GET /api/patients/:patientId/entries`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::accounts::insert_unique_user;
use super::entries::{entry_limit, EntryListResponse, ListQuery};
use crate::api::error::ApiError;
use crate::api::extract::{parse_id, run_blocking, JsonBody};
use crate::api::types::{ApiContext, AuthContext};
use crate::crypto;
use crate::db;
use crate::models::enums::Role;
use crate::models::{MedicalCard, User};
use crate::validation;

fn require_doctor(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.is_doctor() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("only doctors can manage patients".into()))
    }
}

fn assigned_patient(
    conn: &rusqlite::Connection,
    auth: &AuthContext,
    raw_id: &str,
) -> Result<User, ApiError> {
    let patient_id = parse_id(raw_id, "patient")?;
    db::get_assigned_patient(conn, &auth.user_id, &patient_id)?
        .ok_or_else(|| ApiError::NotFound("patient not found".into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientListItem {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub last_entry_date: Option<DateTime<Utc>>,
    pub total_courses: u32,
    pub active_courses: u32,
}

/// `GET /api/patients`
pub async fn list_patients(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<PatientListItem>>, ApiError> {
    require_doctor(&auth)?;

    let conn = ctx.core.open_db()?;
    let patients = db::list_assigned_patients(&conn, &auth.user_id)?;
    let stats = db::course_stats_for_doctor(&conn, &auth.user_id, &Utc::now())?;
    let latest = db::latest_entry_dates_for_doctor(&conn, &auth.user_id)?;

    let items = patients
        .into_iter()
        .map(|p| {
            let course_stats = stats.get(&p.id).copied().unwrap_or_default();
            PatientListItem {
                last_entry_date: latest.get(&p.id).copied(),
                total_courses: course_stats.total,
                active_courses: course_stats.active,
                id: p.id,
                name: p.name,
                email: p.email,
            }
        })
        .collect();

    Ok(Json(items))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreatePatientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub temporary_password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientResponse {
    pub message: String,
    pub patient_id: Uuid,
    pub temporary_password: String,
}

/// `POST /api/patients`: create a patient assigned to the calling doctor.
pub async fn create_patient(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(req): JsonBody<CreatePatientRequest>,
) -> Result<(StatusCode, Json<CreatePatientResponse>), ApiError> {
    require_doctor(&auth)?;

    let (Some(name), Some(email)) = (req.name, req.email) else {
        return Err(ApiError::BadRequest("patient name and email are required".into()));
    };
    let name = validation::normalize_name(&name).map_err(ApiError::BadRequest)?;
    let email = validation::normalize_email(&email).map_err(ApiError::BadRequest)?;

    let temporary_password = match req.temporary_password.filter(|p| !p.is_empty()) {
        Some(password) => {
            validation::validate_password(&password).map_err(ApiError::BadRequest)?;
            password
        }
        None => crypto::generate_temporary_password(),
    };

    {
        let conn = ctx.core.open_db()?;
        if db::email_exists(&conn, &email)? {
            return Err(ApiError::Conflict("a user with this email already exists".into()));
        }
    }

    let plain = temporary_password.clone();
    let password_hash = run_blocking(move || crypto::hash_password(&plain)).await?;

    let patient = User {
        id: Uuid::new_v4(),
        name,
        email,
        password_hash,
        role: Role::Patient,
        assigned_doctor_id: Some(auth.user_id),
        registered_at: Utc::now(),
        medical_card: MedicalCard::default(),
    };
    let conn = ctx.core.open_db()?;
    insert_unique_user(&conn, &patient)?;

    tracing::info!(doctor_id = %auth.user_id, patient_id = %patient.id, "Patient created");

    Ok((
        StatusCode::CREATED,
        Json(CreatePatientResponse {
            message: "Patient added. Hand the temporary password to the patient for the first login."
                .into(),
            patient_id: patient.id,
            temporary_password,
        }),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetail {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub medical_card: MedicalCard,
    pub registered_at: DateTime<Utc>,
}

/// `GET /api/patients/:patientId`
pub async fn get_patient(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<PatientDetail>, ApiError> {
    require_doctor(&auth)?;
    let conn = ctx.core.open_db()?;
    let patient = assigned_patient(&conn, &auth, &patient_id)?;
    Ok(Json(PatientDetail {
        id: patient.id,
        name: patient.name,
        email: patient.email,
        medical_card: patient.medical_card,
        registered_at: patient.registered_at,
    }))
}

/// `GET /api/patients/:patientId/entries`: newest first.
pub async fn patient_entries(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(patient_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<EntryListResponse>, ApiError> {
    require_doctor(&auth)?;
    let limit = entry_limit(query.limit.as_deref())?;
    let conn = ctx.core.open_db()?;
    let patient = assigned_patient(&conn, &auth, &patient_id)?;
    let entries = db::list_recent_entries(&conn, &patient.id, limit)?;
    Ok(Json(EntryListResponse { entries }))
}

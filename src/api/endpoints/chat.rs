//! Doctor/patient chat.
//!
//! - `GET /api/chat[?patientId=]`: conversation, oldest first
//! - `POST /api/chat`: send a message
//!
//! A doctor names the patient; a patient always talks to their assigned doctor.

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
use crate::models::enums::Role;
use crate::models::{ChatMessage, User, UserSummary};
use crate::validation;

/// The two sides of one conversation.
struct Participants {
    doctor: User,
    patient: User,
}

fn resolve_participants(
    conn: &rusqlite::Connection,
    auth: &AuthContext,
    patient_id: Option<&str>,
) -> Result<Participants, ApiError> {
    match auth.role {
        Role::Doctor => {
            let raw = patient_id
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| ApiError::BadRequest("patientId is required".into()))?;
            let patient_id = parse_id(raw, "patient")?;
            let patient = db::get_assigned_patient(conn, &auth.user_id, &patient_id)?
                .ok_or_else(|| ApiError::NotFound("patient not found".into()))?;
            let doctor = db::get_user(conn, &auth.user_id)?
                .ok_or_else(|| ApiError::NotFound("doctor not found".into()))?;
            Ok(Participants { doctor, patient })
        }
        Role::Patient => {
            let patient = db::get_user(conn, &auth.user_id)?
                .ok_or_else(|| ApiError::NotFound("patient not found".into()))?;
            let doctor_id = patient.assigned_doctor_id.ok_or_else(|| {
                ApiError::BadRequest("no doctor is assigned to this patient".into())
            })?;
            let doctor = db::get_user(conn, &doctor_id)?
                .ok_or_else(|| ApiError::NotFound("doctor not found".into()))?;
            Ok(Participants { doctor, patient })
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatQuery {
    pub patient_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub doctor: UserSummary,
    pub patient: UserSummary,
    pub messages: Vec<ChatMessage>,
}

/// `GET /api/chat`: also marks the counterpart's messages as read.
pub async fn get_messages(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ChatQuery>,
) -> Result<Json<ChatResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let Participants { doctor, patient } =
        resolve_participants(&conn, &auth, query.patient_id.as_deref())?;

    let marked = db::mark_chat_read(&conn, &doctor.id, &patient.id, auth.role, &Utc::now())?;
    if marked > 0 {
        tracing::debug!(user_id = %auth.user_id, marked, "Chat messages marked read");
    }
    let messages = db::list_chat_messages(&conn, &doctor.id, &patient.id)?;

    Ok(Json(ChatResponse {
        doctor: UserSummary::from(&doctor),
        patient: UserSummary::from(&patient),
        messages,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendMessageRequest {
    pub message: Option<String>,
    pub patient_id: Option<String>,
}

/// `POST /api/chat`
pub async fn send_message(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ChatQuery>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let content = validation::validate_chat_message(req.message.as_deref().unwrap_or(""))
        .map_err(ApiError::BadRequest)?;

    let patient_id = query.patient_id.or(req.patient_id);
    let conn = ctx.core.open_db()?;
    let Participants { doctor, patient } =
        resolve_participants(&conn, &auth, patient_id.as_deref())?;

    let message = ChatMessage {
        id: Uuid::new_v4(),
        doctor_id: doctor.id,
        patient_id: patient.id,
        sender_id: auth.user_id,
        sender_role: auth.role,
        content,
        created_at: Utc::now(),
        read_at: None,
    };
    db::insert_chat_message(&conn, &message)?;

    tracing::info!(
        sender_id = %auth.user_id,
        doctor_id = %doctor.id,
        patient_id = %patient.id,
        "Chat message sent"
    );
    Ok((StatusCode::CREATED, Json(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::test_support::{make_doctor, make_patient};

    fn auth_for(user: &User) -> AuthContext {
        AuthContext {
            user_id: user.id,
            role: user.role,
            token_hash: String::new(),
        }
    }

    #[test]
    fn patient_resolves_assigned_doctor() {
        let conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "house@clinic.test");
        let patient = make_patient(&conn, "pat@clinic.test", Some(doctor.id));

        let pair = resolve_participants(&conn, &auth_for(&patient), None).unwrap();
        assert_eq!(pair.doctor.id, doctor.id);
        assert_eq!(pair.patient.id, patient.id);
    }

    #[test]
    fn unassigned_patient_is_bad_request() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, "lonely@clinic.test", None);
        let err = resolve_participants(&conn, &auth_for(&patient), None);
        assert!(matches!(err, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn doctor_needs_valid_assigned_patient() {
        let conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "house@clinic.test");
        let stranger = make_patient(&conn, "stranger@clinic.test", None);
        let auth = auth_for(&doctor);

        assert!(matches!(
            resolve_participants(&conn, &auth, None),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            resolve_participants(&conn, &auth, Some("not-an-id")),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            resolve_participants(&conn, &auth, Some(&stranger.id.to_string())),
            Err(ApiError::NotFound(_))
        ));
    }
}

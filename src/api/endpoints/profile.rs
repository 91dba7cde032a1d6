//! Profile endpoints.
//!
//! - `GET /api/profile`: account plus medical card
//! - `PUT /api/profile`: replace the medical card

use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::extract::JsonBody;
use crate::api::types::{ApiContext, AuthContext};
use crate::db;
use crate::models::enums::Role;
use crate::models::{MedicalCard, UserSummary};
use crate::validation;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub assigned_doctor: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_doctor_info: Option<UserSummary>,
    pub medical_card: MedicalCard,
}

pub async fn get_profile(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let user = db::get_user(&conn, &auth.user_id)?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    let assigned_doctor_info = match user.assigned_doctor_id {
        Some(doctor_id) => db::get_user(&conn, &doctor_id)?.as_ref().map(UserSummary::from),
        None => None,
    };

    Ok(Json(ProfileResponse {
        name: user.name,
        email: user.email,
        role: user.role,
        assigned_doctor: user.assigned_doctor_id,
        assigned_doctor_info,
        medical_card: user.medical_card,
    }))
}

/// Missing fields become empty, long ones are truncated.
pub async fn update_profile(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(card): JsonBody<MedicalCard>,
) -> Result<Json<MedicalCard>, ApiError> {
    let card = validation::clamp_medical_card(card);
    let conn = ctx.core.open_db()?;
    match db::update_medical_card(&conn, &auth.user_id, &card) {
        Ok(()) => {}
        Err(db::DatabaseError::NotFound { .. }) => {
            return Err(ApiError::NotFound("user not found".into()))
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(user_id = %auth.user_id, "Medical card updated");
    Ok(Json(card))
}

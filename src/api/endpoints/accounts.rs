//! Account endpoints: registration, login, logout and password reset.
//!
//! - `POST /api/register`
//! - `POST /api/login`
//! - `POST /api/logout` (authenticated)
//! - `POST /api/forgot-password`
//! - `POST /api/reset-password`

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{message, MessageResponse};
use crate::api::error::ApiError;
use crate::api::extract::{required, run_blocking, JsonBody};
use crate::api::types::{ApiContext, AuthContext};
use crate::crypto;
use crate::db;
use crate::mail::RESET_CODE_VALID_MINUTES;
use crate::models::enums::{CodePurpose, Role};
use crate::models::{MedicalCard, User, VerificationCode};
use crate::validation;

/// Same answer whether or not the email is registered.
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for this email, a verification code has been sent";

fn bad_request(detail: String) -> ApiError {
    ApiError::BadRequest(detail)
}

// ── Register ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
}

/// `POST /api/register`: self-registration, doctors only.
pub async fn register(
    State(ctx): State<ApiContext>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let (Some(name), Some(email), Some(password)) = (req.name, req.email, req.password) else {
        return Err(ApiError::BadRequest(
            "name, email and password are required".into(),
        ));
    };

    if let Some(role) = req.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        match role.parse::<Role>() {
            Ok(Role::Doctor) => {}
            Ok(Role::Patient) => {
                return Err(ApiError::BadRequest(
                    "patients are registered by their doctor".into(),
                ))
            }
            Err(_) => return Err(ApiError::BadRequest(format!("unknown role: {role}"))),
        }
    }

    let email = validation::normalize_email(&email).map_err(bad_request)?;
    validation::validate_password(&password).map_err(bad_request)?;
    let name = validation::normalize_name(&name).map_err(bad_request)?;

    {
        let conn = ctx.core.open_db()?;
        if db::email_exists(&conn, &email)? {
            return Err(ApiError::Conflict("a user with this email already exists".into()));
        }
    }

    let password_hash = run_blocking(move || crypto::hash_password(&password)).await?;

    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        password_hash,
        role: Role::Doctor,
        assigned_doctor_id: None,
        registered_at: Utc::now(),
        medical_card: MedicalCard::default(),
    };

    let conn = ctx.core.open_db()?;
    insert_unique_user(&conn, &user)?;

    tracing::info!(user_id = %user.id, "Doctor registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "registration successful".into(),
            user_id: user.id,
        }),
    ))
}

/// Insert a user, mapping a lost race on the email index to 409.
pub(crate) fn insert_unique_user(conn: &rusqlite::Connection, user: &User) -> Result<(), ApiError> {
    match db::insert_user(conn, user) {
        Ok(()) => Ok(()),
        Err(e) if e.is_unique_violation() => Err(ApiError::Conflict(
            "a user with this email already exists".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

// ── Login / logout ──────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub name: String,
    pub email: String,
    pub user_id: Uuid,
    pub role: Role,
}

fn invalid_credentials() -> ApiError {
    ApiError::BadRequest("invalid credentials".into())
}

/// `POST /api/login`: exchange credentials for a session token.
pub async fn login(
    State(ctx): State<ApiContext>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = required(req.email, "email")?.to_lowercase();
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("password is required".into()))?;

    ctx.check_auth_attempt(&email)?;

    let user = {
        let conn = ctx.core.open_db()?;
        db::get_user_by_email(&conn, &email)?
    };
    let Some(user) = user else {
        run_blocking(move || crypto::verify_decoy(&password)).await?;
        tracing::info!("Login failed: unknown email");
        return Err(invalid_credentials());
    };

    let stored = user.password_hash.clone();
    let verified = run_blocking(move || crypto::verify_password(&password, &stored)).await?;
    if let Err(e) = verified {
        tracing::info!(user_id = %user.id, reason = %e, "Login failed");
        return Err(invalid_credentials());
    }

    let token = crypto::generate_token();
    let token_hash = crypto::hash_token(&ctx.core.config.token_secret, &token);
    let now = Utc::now();
    let expires_at = now + Duration::days(ctx.core.config.token_ttl_days);
    {
        let conn = ctx.core.open_db()?;
        db::insert_session(&conn, &token_hash, &user.id, &now, &expires_at)?;
    }

    tracing::info!(user_id = %user.id, role = %user.role, "Login succeeded");

    Ok(Json(LoginResponse {
        token,
        name: user.name,
        email: user.email,
        user_id: user.id,
        role: user.role,
    }))
}

/// `POST /api/logout`: revoke the presented token.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<MessageResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    db::delete_session(&conn, &auth.token_hash)?;
    tracing::info!(user_id = %auth.user_id, "Logged out");
    Ok(message("logged out"))
}

// ── Password reset ──────────────────────────────────────

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// `POST /api/forgot-password`: mail a six-digit reset code.
pub async fn forgot_password(
    State(ctx): State<ApiContext>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = required(req.email, "email")?.to_lowercase();
    ctx.check_auth_attempt(&email)?;

    let known = {
        let conn = ctx.core.open_db()?;
        db::email_exists(&conn, &email)?
    };
    if !known {
        return Ok(message(FORGOT_PASSWORD_MESSAGE));
    }

    let now = Utc::now();
    let code = VerificationCode {
        id: Uuid::new_v4(),
        email: email.clone(),
        code: crypto::generate_verification_code(),
        purpose: CodePurpose::PasswordReset,
        expires_at: now + Duration::minutes(RESET_CODE_VALID_MINUTES),
        created_at: now,
    };
    {
        let conn = ctx.core.open_db()?;
        db::replace_verification_code(&conn, &code)?;
    }

    let mailer = ctx.core.mailer.clone();
    let sent = run_blocking(move || mailer.send_password_reset(&code.email, &code.code)).await?;
    if let Err(e) = sent {
        // Same response either way; a failed send must not reveal the account.
        tracing::error!(error = %e, "Password reset mail failed");
    }

    Ok(message(FORGOT_PASSWORD_MESSAGE))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub code: Option<String>,
    pub new_password: Option<String>,
}

/// `POST /api/reset-password`: set a new password with a valid code.
pub async fn reset_password(
    State(ctx): State<ApiContext>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (Some(email), Some(code), Some(new_password)) = (req.email, req.code, req.new_password)
    else {
        return Err(ApiError::BadRequest(
            "email, code and newPassword are required".into(),
        ));
    };
    let email = email.trim().to_lowercase();
    let code = code.trim().to_string();
    validation::validate_password(&new_password).map_err(bad_request)?;

    ctx.check_auth_attempt(&email)?;

    let user = {
        let conn = ctx.core.open_db()?;
        let valid =
            db::find_valid_code(&conn, &email, &code, CodePurpose::PasswordReset, &Utc::now())?;
        if valid.is_none() {
            return Err(ApiError::BadRequest("invalid or expired code".into()));
        }
        db::get_user_by_email(&conn, &email)?
            .ok_or_else(|| ApiError::NotFound("user not found".into()))?
    };

    let password_hash = run_blocking(move || crypto::hash_password(&new_password)).await?;

    let conn = ctx.core.open_db()?;
    db::update_password_hash(&conn, &user.id, &password_hash)?;
    db::delete_verification_codes(&conn, &email, CodePurpose::PasswordReset)?;
    let revoked = db::delete_sessions_for_user(&conn, &user.id)?;

    tracing::info!(user_id = %user.id, revoked, "Password reset");

    Ok(message("password updated"))
}

//! API endpoint handlers.
//!
//! Each module corresponds to one resource of the public API.

pub mod accounts;
pub mod analytics;
pub mod chat;
pub mod courses;
pub mod entries;
pub mod health;
pub mod insight;
pub mod patients;
pub mod profile;
pub mod report;

use axum::Json;
use serde::Serialize;

/// `{ "message": ... }` acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub(crate) fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

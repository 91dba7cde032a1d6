use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

/// Account record. Never serialised directly, the hash stays server-side.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub assigned_doctor_id: Option<Uuid>,
    pub registered_at: DateTime<Utc>,
    pub medical_card: MedicalCard,
}

/// Free-text medical card kept on the patient's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicalCard {
    pub full_name: String,
    pub birth_date: String,
    pub blood_type: String,
    pub allergies: String,
    pub chronic_diseases: String,
    pub emergency_contact: String,
    pub insurance_number: String,
    pub additional_info: String,
}

/// Public view of another user (doctor or patient) in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

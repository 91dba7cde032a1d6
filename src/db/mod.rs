pub mod repository;
pub mod sqlite;

pub use repository::*;
pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Corrupt column {column}: {reason}")]
    CorruptColumn { column: &'static str, reason: String },
}

impl DatabaseError {
    /// True when the error is a UNIQUE/PRIMARY KEY violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            }
            _ => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Local, Utc};
    use rusqlite::Connection;
    use uuid::Uuid;

    use super::repository::{insert_course, insert_user};
    use crate::models::enums::Role;
    use crate::models::{HealthEntry, MedicalCard, TreatmentCourse, User};

    // Not a real hash; repository tests never verify passwords.
    const FIXTURE_HASH: &str = "pbkdf2-sha256$1$c2FsdA$aGFzaA";

    fn make_user(conn: &Connection, email: &str, role: Role, doctor: Option<Uuid>) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: email.split('@').next().unwrap_or("user").to_string(),
            email: email.to_string(),
            password_hash: FIXTURE_HASH.to_string(),
            role,
            assigned_doctor_id: doctor,
            registered_at: Utc::now(),
            medical_card: MedicalCard::default(),
        };
        insert_user(conn, &user).unwrap();
        user
    }

    pub fn make_doctor(conn: &Connection, email: &str) -> User {
        make_user(conn, email, Role::Doctor, None)
    }

    pub fn make_patient(conn: &Connection, email: &str, doctor: Option<Uuid>) -> User {
        make_user(conn, email, Role::Patient, doctor)
    }

    pub fn make_course(
        conn: &Connection,
        patient_id: &Uuid,
        doctor_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> TreatmentCourse {
        let course = TreatmentCourse {
            id: Uuid::new_v4(),
            patient_id: *patient_id,
            doctor_id,
            name: "Migraine prophylaxis".into(),
            main_symptom: "headache".into(),
            start_date: start,
            end_date: end,
        };
        insert_course(conn, &course).unwrap();
        course
    }

    /// Unsaved entry dated `at`, filed under its local day.
    pub fn make_entry(user_id: &Uuid, at: DateTime<Utc>, level: Option<u8>) -> HealthEntry {
        HealthEntry {
            id: Uuid::new_v4(),
            user_id: *user_id,
            entry_date: at,
            entry_day: at.with_timezone(&Local).date_naive(),
            course_id: None,
            medications: Vec::new(),
            medications_taken: Vec::new(),
            symptoms: Vec::new(),
            symptom_level: level,
            symptom_tags: Vec::new(),
            lifestyle_tags: Vec::new(),
            notes: None,
        }
    }
}

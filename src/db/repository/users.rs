use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::columns::*;
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::{MedicalCard, User};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, assigned_doctor_id, registered_at, medical_card";

struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    assigned_doctor_id: Option<String>,
    registered_at: String,
    medical_card: String,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: row.get(4)?,
            assigned_doctor_id: row.get(5)?,
            registered_at: row.get(6)?,
            medical_card: row.get(7)?,
        })
    }

    fn into_user(self) -> Result<User, DatabaseError> {
        Ok(User {
            id: parse_uuid("users.id", &self.id)?,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            role: Role::from_str(&self.role)?,
            assigned_doctor_id: parse_opt_uuid("users.assigned_doctor_id", self.assigned_doctor_id)?,
            registered_at: parse_ts("users.registered_at", &self.registered_at)?,
            medical_card: from_json("users.medical_card", &self.medical_card)?,
        })
    }
}

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, role, assigned_doctor_id,
         registered_at, medical_card)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id.to_string(),
            user.name,
            user.email,
            user.password_hash,
            user.role.as_str(),
            user.assigned_doctor_id.map(|id| id.to_string()),
            ts(&user.registered_at),
            to_json("users.medical_card", &user.medical_card)?,
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], UserRow::from_row)
        .optional()?
        .map(UserRow::into_user)
        .transpose()
}

/// Look up by email. Callers pass the already-normalised (lower-case) address.
pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    conn.query_row(&sql, params![email], UserRow::from_row)
        .optional()?
        .map(UserRow::into_user)
        .transpose()
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn update_password_hash(
    conn: &Connection,
    id: &Uuid,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?2 WHERE id = ?1",
        params![id.to_string(), password_hash],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "user".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn update_medical_card(
    conn: &Connection,
    id: &Uuid,
    card: &MedicalCard,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET medical_card = ?2 WHERE id = ?1",
        params![id.to_string(), to_json("users.medical_card", card)?],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "user".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Patients whose assigned doctor is `doctor_id`, ordered by name.
pub fn list_assigned_patients(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<User>, DatabaseError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE assigned_doctor_id = ?1 AND role = 'patient'
         ORDER BY name COLLATE NOCASE"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![doctor_id.to_string()], UserRow::from_row)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row?.into_user()?);
    }
    Ok(users)
}

/// A single patient, only if assigned to `doctor_id`.
pub fn get_assigned_patient(
    conn: &Connection,
    doctor_id: &Uuid,
    patient_id: &Uuid,
) -> Result<Option<User>, DatabaseError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE id = ?1 AND assigned_doctor_id = ?2 AND role = 'patient'"
    );
    conn.query_row(
        &sql,
        params![patient_id.to_string(), doctor_id.to_string()],
        UserRow::from_row,
    )
    .optional()?
    .map(UserRow::into_user)
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::test_support::{make_doctor, make_patient};

    #[test]
    fn insert_and_fetch_by_id_and_email() {
        let conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "house@clinic.test");

        let by_id = get_user(&conn, &doctor.id).unwrap().unwrap();
        assert_eq!(by_id.email, "house@clinic.test");
        assert_eq!(by_id.role, Role::Doctor);

        let by_email = get_user_by_email(&conn, "house@clinic.test").unwrap().unwrap();
        assert_eq!(by_email.id, doctor.id);
        assert!(get_user_by_email(&conn, "nobody@clinic.test").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_unique_violation() {
        let conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "dup@clinic.test");
        let mut clone = doctor.clone();
        clone.id = Uuid::new_v4();
        let err = insert_user(&conn, &clone).unwrap_err();
        assert!(err.is_unique_violation());
        assert!(email_exists(&conn, "dup@clinic.test").unwrap());
    }

    #[test]
    fn medical_card_round_trips() {
        let conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "doc@clinic.test");
        let patient = make_patient(&conn, "pat@clinic.test", Some(doctor.id));

        let card = MedicalCard {
            full_name: "Anna Petrova".into(),
            blood_type: "A+".into(),
            allergies: "penicillin".into(),
            ..MedicalCard::default()
        };
        update_medical_card(&conn, &patient.id, &card).unwrap();

        let stored = get_user(&conn, &patient.id).unwrap().unwrap();
        assert_eq!(stored.medical_card, card);
    }

    #[test]
    fn assigned_patient_lookup_is_scoped_to_doctor() {
        let conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "a@clinic.test");
        let other = make_doctor(&conn, "b@clinic.test");
        let patient = make_patient(&conn, "p@clinic.test", Some(doctor.id));

        assert!(get_assigned_patient(&conn, &doctor.id, &patient.id).unwrap().is_some());
        assert!(get_assigned_patient(&conn, &other.id, &patient.id).unwrap().is_none());

        let roster = list_assigned_patients(&conn, &doctor.id).unwrap();
        assert_eq!(roster.len(), 1);
        assert!(list_assigned_patients(&conn, &other.id).unwrap().is_empty());
    }

    #[test]
    fn update_password_for_missing_user_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = update_password_hash(&conn, &Uuid::new_v4(), "x").unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}

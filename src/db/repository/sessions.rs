use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::columns::*;
use crate::db::DatabaseError;
use crate::models::enums::Role;

/// A stored session resolved to its owner.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

pub fn insert_session(
    conn: &Connection,
    token_hash: &str,
    user_id: &Uuid,
    created_at: &DateTime<Utc>,
    expires_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![token_hash, user_id.to_string(), ts(created_at), ts(expires_at)],
    )?;
    Ok(())
}

/// Resolve a token hash to its user and role. Expiry is left to the caller.
pub fn find_session(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<SessionRecord>, DatabaseError> {
    let raw = conn
        .query_row(
            "SELECT s.user_id, u.role, s.expires_at
             FROM sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ?1",
            params![token_hash],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    match raw {
        None => Ok(None),
        Some((user_id, role, expires_at)) => Ok(Some(SessionRecord {
            user_id: parse_uuid("sessions.user_id", &user_id)?,
            role: Role::from_str(&role)?,
            expires_at: parse_ts("sessions.expires_at", &expires_at)?,
        })),
    }
}

pub fn delete_session(conn: &Connection, token_hash: &str) -> Result<bool, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![token_hash],
    )?;
    Ok(removed > 0)
}

pub fn delete_sessions_for_user(conn: &Connection, user_id: &Uuid) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1",
        params![user_id.to_string()],
    )?)
}

pub fn purge_expired_sessions(conn: &Connection, now: &DateTime<Utc>) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![ts(now)],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::test_support::make_doctor;
    use chrono::Duration;

    #[test]
    fn session_resolves_to_user_role() {
        let conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "s@clinic.test");
        let now = Utc::now();
        insert_session(&conn, "hash-1", &doctor.id, &now, &(now + Duration::days(30))).unwrap();

        let session = find_session(&conn, "hash-1").unwrap().unwrap();
        assert_eq!(session.user_id, doctor.id);
        assert_eq!(session.role, Role::Doctor);
        assert!(find_session(&conn, "hash-2").unwrap().is_none());
    }

    #[test]
    fn revoke_all_sessions_for_user() {
        let conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "r@clinic.test");
        let now = Utc::now();
        let later = now + Duration::days(1);
        insert_session(&conn, "a", &doctor.id, &now, &later).unwrap();
        insert_session(&conn, "b", &doctor.id, &now, &later).unwrap();

        assert_eq!(delete_sessions_for_user(&conn, &doctor.id).unwrap(), 2);
        assert!(!delete_session(&conn, "a").unwrap());
    }

    #[test]
    fn purge_removes_only_expired() {
        let conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "p@clinic.test");
        let now = Utc::now();
        insert_session(&conn, "old", &doctor.id, &now, &(now - Duration::seconds(1))).unwrap();
        insert_session(&conn, "new", &doctor.id, &now, &(now + Duration::days(1))).unwrap();

        assert_eq!(purge_expired_sessions(&conn, &now).unwrap(), 1);
        assert!(find_session(&conn, "new").unwrap().is_some());
    }
}

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::columns::*;
use crate::db::DatabaseError;
use crate::models::enums::CodePurpose;
use crate::models::VerificationCode;

/// Store a code, dropping any earlier codes for the same email and purpose.
pub fn replace_verification_code(
    conn: &Connection,
    code: &VerificationCode,
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM verification_codes WHERE email = ?1 AND purpose = ?2",
        params![code.email, code.purpose.as_str()],
    )?;
    tx.execute(
        "INSERT INTO verification_codes (id, email, code, purpose, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            code.id.to_string(),
            code.email,
            code.code,
            code.purpose.as_str(),
            ts(&code.expires_at),
            ts(&code.created_at),
        ],
    )?;
    tx.commit()?;
    Ok(())
}

/// Find an unexpired code matching email, code and purpose.
pub fn find_valid_code(
    conn: &Connection,
    email: &str,
    code: &str,
    purpose: CodePurpose,
    now: &DateTime<Utc>,
) -> Result<Option<VerificationCode>, DatabaseError> {
    let raw = conn
        .query_row(
            "SELECT id, email, code, purpose, expires_at, created_at
             FROM verification_codes
             WHERE email = ?1 AND code = ?2 AND purpose = ?3 AND expires_at > ?4",
            params![email, code, purpose.as_str(), ts(now)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((id, email, code, purpose, expires_at, created_at)) = raw else {
        return Ok(None);
    };
    Ok(Some(VerificationCode {
        id: parse_uuid("verification_codes.id", &id)?,
        email,
        code,
        purpose: CodePurpose::from_str(&purpose)?,
        expires_at: parse_ts("verification_codes.expires_at", &expires_at)?,
        created_at: parse_ts("verification_codes.created_at", &created_at)?,
    }))
}

pub fn delete_verification_codes(
    conn: &Connection,
    email: &str,
    purpose: CodePurpose,
) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM verification_codes WHERE email = ?1 AND purpose = ?2",
        params![email, purpose.as_str()],
    )?)
}

pub fn purge_expired_codes(conn: &Connection, now: &DateTime<Utc>) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM verification_codes WHERE expires_at <= ?1",
        params![ts(now)],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Duration;
    use uuid::Uuid;

    fn code(email: &str, value: &str, expires_in: Duration) -> VerificationCode {
        let now = Utc::now();
        VerificationCode {
            id: Uuid::new_v4(),
            email: email.into(),
            code: value.into(),
            purpose: CodePurpose::PasswordReset,
            expires_at: now + expires_in,
            created_at: now,
        }
    }

    #[test]
    fn replacing_invalidates_previous_code() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        replace_verification_code(&conn, &code("a@x.test", "111111", Duration::minutes(5))).unwrap();
        replace_verification_code(&conn, &code("a@x.test", "222222", Duration::minutes(5))).unwrap();

        let purpose = CodePurpose::PasswordReset;
        assert!(find_valid_code(&conn, "a@x.test", "111111", purpose, &now).unwrap().is_none());
        assert!(find_valid_code(&conn, "a@x.test", "222222", purpose, &now).unwrap().is_some());
    }

    #[test]
    fn expired_code_is_not_valid() {
        let conn = open_memory_database().unwrap();
        replace_verification_code(&conn, &code("b@x.test", "333333", Duration::seconds(-1))).unwrap();
        let found = find_valid_code(
            &conn,
            "b@x.test",
            "333333",
            CodePurpose::PasswordReset,
            &Utc::now(),
        )
        .unwrap();
        assert!(found.is_none());
        assert_eq!(purge_expired_codes(&conn, &Utc::now()).unwrap(), 1);
    }

    #[test]
    fn delete_codes_for_email() {
        let conn = open_memory_database().unwrap();
        replace_verification_code(&conn, &code("c@x.test", "444444", Duration::minutes(5))).unwrap();
        assert_eq!(
            delete_verification_codes(&conn, "c@x.test", CodePurpose::PasswordReset).unwrap(),
            1
        );
    }
}

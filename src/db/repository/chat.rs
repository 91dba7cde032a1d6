use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::columns::*;
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::ChatMessage;

pub fn insert_chat_message(conn: &Connection, msg: &ChatMessage) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO chat_messages (id, doctor_id, patient_id, sender_id, sender_role,
         content, created_at, read_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            msg.id.to_string(),
            msg.doctor_id.to_string(),
            msg.patient_id.to_string(),
            msg.sender_id.to_string(),
            msg.sender_role.as_str(),
            msg.content,
            ts(&msg.created_at),
            msg.read_at.as_ref().map(ts),
        ],
    )?;
    Ok(())
}

/// Conversation between one doctor and one patient, oldest first.
pub fn list_chat_messages(
    conn: &Connection,
    doctor_id: &Uuid,
    patient_id: &Uuid,
) -> Result<Vec<ChatMessage>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, doctor_id, patient_id, sender_id, sender_role, content, created_at, read_at
         FROM chat_messages
         WHERE doctor_id = ?1 AND patient_id = ?2
         ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![doctor_id.to_string(), patient_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, Option<String>>(7)?,
        ))
    })?;

    let mut messages = Vec::new();
    for row in rows {
        let (id, doctor_id, patient_id, sender_id, sender_role, content, created_at, read_at) =
            row?;
        messages.push(ChatMessage {
            id: parse_uuid("chat_messages.id", &id)?,
            doctor_id: parse_uuid("chat_messages.doctor_id", &doctor_id)?,
            patient_id: parse_uuid("chat_messages.patient_id", &patient_id)?,
            sender_id: parse_uuid("chat_messages.sender_id", &sender_id)?,
            sender_role: Role::from_str(&sender_role)?,
            content,
            created_at: parse_ts("chat_messages.created_at", &created_at)?,
            read_at: parse_opt_ts("chat_messages.read_at", read_at)?,
        });
    }
    Ok(messages)
}

/// Mark everything the counterpart sent to `reader` as read.
pub fn mark_chat_read(
    conn: &Connection,
    doctor_id: &Uuid,
    patient_id: &Uuid,
    reader: Role,
    now: &DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "UPDATE chat_messages SET read_at = ?4
         WHERE doctor_id = ?1 AND patient_id = ?2 AND sender_role != ?3 AND read_at IS NULL",
        params![
            doctor_id.to_string(),
            patient_id.to_string(),
            reader.as_str(),
            ts(now),
        ],
    )?)
}

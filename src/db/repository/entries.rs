use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::columns::*;
use crate::db::DatabaseError;
use crate::models::HealthEntry;

const ENTRY_COLUMNS: &str = "id, user_id, entry_date, entry_day, course_id, medications,
    medications_taken, symptoms, symptom_level, symptom_tags, lifestyle_tags, notes";

struct EntryRow {
    id: String,
    user_id: String,
    entry_date: String,
    entry_day: String,
    course_id: Option<String>,
    medications: String,
    medications_taken: String,
    symptoms: String,
    symptom_level: Option<u8>,
    symptom_tags: String,
    lifestyle_tags: String,
    notes: Option<String>,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            entry_date: row.get(2)?,
            entry_day: row.get(3)?,
            course_id: row.get(4)?,
            medications: row.get(5)?,
            medications_taken: row.get(6)?,
            symptoms: row.get(7)?,
            symptom_level: row.get(8)?,
            symptom_tags: row.get(9)?,
            lifestyle_tags: row.get(10)?,
            notes: row.get(11)?,
        })
    }

    fn into_entry(self) -> Result<HealthEntry, DatabaseError> {
        Ok(HealthEntry {
            id: parse_uuid("health_entries.id", &self.id)?,
            user_id: parse_uuid("health_entries.user_id", &self.user_id)?,
            entry_date: parse_ts("health_entries.entry_date", &self.entry_date)?,
            entry_day: parse_day("health_entries.entry_day", &self.entry_day)?,
            course_id: parse_opt_uuid("health_entries.course_id", self.course_id)?,
            medications: from_json("health_entries.medications", &self.medications)?,
            medications_taken: from_json(
                "health_entries.medications_taken",
                &self.medications_taken,
            )?,
            symptoms: from_json("health_entries.symptoms", &self.symptoms)?,
            symptom_level: self.symptom_level,
            symptom_tags: from_json("health_entries.symptom_tags", &self.symptom_tags)?,
            lifestyle_tags: from_json("health_entries.lifestyle_tags", &self.lifestyle_tags)?,
            notes: self.notes,
        })
    }
}

fn collect_entries(
    stmt: &mut rusqlite::Statement<'_>,
    params: impl rusqlite::Params,
) -> Result<Vec<HealthEntry>, DatabaseError> {
    let rows = stmt.query_map(params, EntryRow::from_row)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.into_entry()?);
    }
    Ok(entries)
}

pub fn find_entry_for_day(
    conn: &Connection,
    user_id: &Uuid,
    entry_day: &NaiveDate,
) -> Result<Option<HealthEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM health_entries WHERE user_id = ?1 AND entry_day = ?2"
    );
    conn.query_row(&sql, params![user_id.to_string(), day(entry_day)], EntryRow::from_row)
        .optional()?
        .map(EntryRow::into_entry)
        .transpose()
}

/// Insert the entry, or replace every field of the user's entry for the same day.
///
/// Returns the stored entry; on replace it keeps the existing id.
pub fn upsert_entry(conn: &Connection, entry: &HealthEntry) -> Result<HealthEntry, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let existing_id: Option<String> = tx
        .query_row(
            "SELECT id FROM health_entries WHERE user_id = ?1 AND entry_day = ?2",
            params![entry.user_id.to_string(), day(&entry.entry_day)],
            |row| row.get(0),
        )
        .optional()?;

    let mut stored = entry.clone();
    if let Some(id) = existing_id {
        stored.id = parse_uuid("health_entries.id", &id)?;
    }

    tx.execute(
        "INSERT INTO health_entries (id, user_id, entry_date, entry_day, course_id, medications,
         medications_taken, symptoms, symptom_level, symptom_tags, lifestyle_tags, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(user_id, entry_day) DO UPDATE SET
            entry_date = excluded.entry_date,
            course_id = excluded.course_id,
            medications = excluded.medications,
            medications_taken = excluded.medications_taken,
            symptoms = excluded.symptoms,
            symptom_level = excluded.symptom_level,
            symptom_tags = excluded.symptom_tags,
            lifestyle_tags = excluded.lifestyle_tags,
            notes = excluded.notes",
        params![
            stored.id.to_string(),
            stored.user_id.to_string(),
            ts(&stored.entry_date),
            day(&stored.entry_day),
            stored.course_id.map(|id| id.to_string()),
            to_json("health_entries.medications", &stored.medications)?,
            to_json("health_entries.medications_taken", &stored.medications_taken)?,
            to_json("health_entries.symptoms", &stored.symptoms)?,
            stored.symptom_level,
            to_json("health_entries.symptom_tags", &stored.symptom_tags)?,
            to_json("health_entries.lifestyle_tags", &stored.lifestyle_tags)?,
            stored.notes,
        ],
    )?;
    tx.commit()?;
    Ok(stored)
}

/// The user's `limit` most recent entries, newest first.
pub fn list_recent_entries(
    conn: &Connection,
    user_id: &Uuid,
    limit: u32,
) -> Result<Vec<HealthEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM health_entries
         WHERE user_id = ?1 ORDER BY entry_date DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    collect_entries(&mut stmt, params![user_id.to_string(), limit])
}

/// Every entry of the user, oldest first.
pub fn list_entries_chronological(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Vec<HealthEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM health_entries
         WHERE user_id = ?1 ORDER BY entry_date ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    collect_entries(&mut stmt, params![user_id.to_string()])
}

/// Entries the user logged against one course, oldest first.
pub fn list_course_entries(
    conn: &Connection,
    user_id: &Uuid,
    course_id: &Uuid,
) -> Result<Vec<HealthEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM health_entries
         WHERE user_id = ?1 AND course_id = ?2 ORDER BY entry_date ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    collect_entries(&mut stmt, params![user_id.to_string(), course_id.to_string()])
}

/// Most recent entry date per patient assigned to `doctor_id`.
pub fn latest_entry_dates_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<HashMap<Uuid, DateTime<Utc>>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT e.user_id, MAX(e.entry_date)
         FROM health_entries e
         JOIN users u ON u.id = e.user_id
         WHERE u.assigned_doctor_id = ?1 AND u.role = 'patient'
         GROUP BY e.user_id",
    )?;
    let rows = stmt.query_map(params![doctor_id.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut latest = HashMap::new();
    for row in rows {
        let (user_id, entry_date) = row?;
        latest.insert(
            parse_uuid("health_entries.user_id", &user_id)?,
            parse_ts("health_entries.entry_date", &entry_date)?,
        );
    }
    Ok(latest)
}

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::columns::*;
use crate::db::DatabaseError;
use crate::models::Medication;

type MedicationRow = (String, String, String, String, String);

fn medication_row(row: &Row<'_>) -> rusqlite::Result<MedicationRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn medication_from_row(raw: MedicationRow) -> Result<Medication, DatabaseError> {
    let (id, course_id, name, dosage, schedule) = raw;
    Ok(Medication {
        id: parse_uuid("medications.id", &id)?,
        course_id: parse_uuid("medications.course_id", &course_id)?,
        name,
        dosage,
        schedule: from_json("medications.schedule", &schedule)?,
    })
}

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, course_id, name, dosage, schedule)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            med.id.to_string(),
            med.course_id.to_string(),
            med.name,
            med.dosage,
            to_json("medications.schedule", &med.schedule)?,
        ],
    )?;
    Ok(())
}

/// Fetch a medication, only if it belongs to `course_id`.
pub fn get_course_medication(
    conn: &Connection,
    course_id: &Uuid,
    med_id: &Uuid,
) -> Result<Option<Medication>, DatabaseError> {
    conn.query_row(
        "SELECT id, course_id, name, dosage, schedule FROM medications
         WHERE id = ?1 AND course_id = ?2",
        params![med_id.to_string(), course_id.to_string()],
        medication_row,
    )
    .optional()?
    .map(medication_from_row)
    .transpose()
}

pub fn list_medications_for_course(
    conn: &Connection,
    course_id: &Uuid,
) -> Result<Vec<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, course_id, name, dosage, schedule FROM medications
         WHERE course_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![course_id.to_string()], medication_row)?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row?)?);
    }
    Ok(meds)
}

pub fn update_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE medications SET name = ?3, dosage = ?4, schedule = ?5
         WHERE id = ?1 AND course_id = ?2",
        params![
            med.id.to_string(),
            med.course_id.to_string(),
            med.name,
            med.dosage,
            to_json("medications.schedule", &med.schedule)?,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "medication".into(),
            id: med.id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_course_medication(
    conn: &Connection,
    course_id: &Uuid,
    med_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM medications WHERE id = ?1 AND course_id = ?2",
        params![med_id.to_string(), course_id.to_string()],
    )?;
    Ok(removed > 0)
}

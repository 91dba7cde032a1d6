use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::columns::*;
use crate::db::DatabaseError;
use crate::models::TreatmentCourse;

const COURSE_COLUMNS: &str = "id, patient_id, doctor_id, name, main_symptom, start_date, end_date";

/// Per-patient course counts for the doctor roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CourseStats {
    pub total: u32,
    pub active: u32,
}

type CourseRow = (String, String, Option<String>, String, String, String, Option<String>);

fn course_row(row: &Row<'_>) -> rusqlite::Result<CourseRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn course_from_row(raw: CourseRow) -> Result<TreatmentCourse, DatabaseError> {
    let (id, patient_id, doctor_id, name, main_symptom, start_date, end_date) = raw;
    Ok(TreatmentCourse {
        id: parse_uuid("treatment_courses.id", &id)?,
        patient_id: parse_uuid("treatment_courses.patient_id", &patient_id)?,
        doctor_id: parse_opt_uuid("treatment_courses.doctor_id", doctor_id)?,
        name,
        main_symptom,
        start_date: parse_ts("treatment_courses.start_date", &start_date)?,
        end_date: parse_opt_ts("treatment_courses.end_date", end_date)?,
    })
}

pub fn insert_course(conn: &Connection, course: &TreatmentCourse) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO treatment_courses (id, patient_id, doctor_id, name, main_symptom,
         start_date, end_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            course.id.to_string(),
            course.patient_id.to_string(),
            course.doctor_id.map(|id| id.to_string()),
            course.name,
            course.main_symptom,
            ts(&course.start_date),
            course.end_date.as_ref().map(ts),
        ],
    )?;
    Ok(())
}

pub fn get_course(conn: &Connection, id: &Uuid) -> Result<Option<TreatmentCourse>, DatabaseError> {
    let sql = format!("SELECT {COURSE_COLUMNS} FROM treatment_courses WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], course_row)
        .optional()?
        .map(course_from_row)
        .transpose()
}

/// All courses of a patient, most recent start first.
pub fn list_courses_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<TreatmentCourse>, DatabaseError> {
    let sql = format!(
        "SELECT {COURSE_COLUMNS} FROM treatment_courses
         WHERE patient_id = ?1 ORDER BY start_date DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient_id.to_string()], course_row)?;

    let mut courses = Vec::new();
    for row in rows {
        courses.push(course_from_row(row?)?);
    }
    Ok(courses)
}

/// Overwrite the mutable fields of an existing course.
pub fn update_course(conn: &Connection, course: &TreatmentCourse) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE treatment_courses
         SET name = ?2, main_symptom = ?3, start_date = ?4, end_date = ?5
         WHERE id = ?1",
        params![
            course.id.to_string(),
            course.name,
            course.main_symptom,
            ts(&course.start_date),
            course.end_date.as_ref().map(ts),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "treatment_course".into(),
            id: course.id.to_string(),
        });
    }
    Ok(())
}

/// Delete a course. Its medications go with it (FK cascade).
pub fn delete_course(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM treatment_courses WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(removed > 0)
}

/// Course totals for every patient assigned to `doctor_id`.
///
/// Patients without courses are absent from the map.
pub fn course_stats_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
    now: &DateTime<Utc>,
) -> Result<HashMap<Uuid, CourseStats>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT c.patient_id,
                COUNT(*),
                SUM(CASE WHEN c.end_date IS NULL OR c.end_date >= ?2 THEN 1 ELSE 0 END)
         FROM treatment_courses c
         JOIN users u ON u.id = c.patient_id
         WHERE u.assigned_doctor_id = ?1 AND u.role = 'patient'
         GROUP BY c.patient_id",
    )?;
    let rows = stmt.query_map(params![doctor_id.to_string(), ts(now)], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, u32>(1)?,
            row.get::<_, u32>(2)?,
        ))
    })?;

    let mut stats = HashMap::new();
    for row in rows {
        let (patient_id, total, active) = row?;
        stats.insert(
            parse_uuid("treatment_courses.patient_id", &patient_id)?,
            CourseStats { total, active },
        );
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::test_support::{make_course, make_doctor, make_patient};
    use chrono::Duration;

    #[test]
    fn courses_listed_newest_start_first() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, "p@clinic.test", None);
        let now = Utc::now();
        let older = make_course(&conn, &patient.id, None, now - Duration::days(30), None);
        let newer = make_course(&conn, &patient.id, None, now - Duration::days(2), None);

        let listed = list_courses_for_patient(&conn, &patient.id).unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[test]
    fn update_and_delete_course() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, "p@clinic.test", None);
        let mut course = make_course(&conn, &patient.id, None, Utc::now(), None);

        course.name = "Renamed".into();
        course.end_date = Some(Utc::now() + Duration::days(14));
        update_course(&conn, &course).unwrap();

        let stored = get_course(&conn, &course.id).unwrap().unwrap();
        assert_eq!(stored.name, "Renamed");
        assert!(stored.end_date.is_some());

        assert!(delete_course(&conn, &course.id).unwrap());
        assert!(get_course(&conn, &course.id).unwrap().is_none());
        assert!(!delete_course(&conn, &course.id).unwrap());
    }

    #[test]
    fn stats_count_active_and_total_per_patient() {
        let conn = open_memory_database().unwrap();
        let doctor = make_doctor(&conn, "d@clinic.test");
        let p1 = make_patient(&conn, "p1@clinic.test", Some(doctor.id));
        let p2 = make_patient(&conn, "p2@clinic.test", Some(doctor.id));
        let now = Utc::now();

        make_course(&conn, &p1.id, Some(doctor.id), now - Duration::days(60), Some(now - Duration::days(30)));
        make_course(&conn, &p1.id, Some(doctor.id), now - Duration::days(5), None);
        make_course(&conn, &p1.id, Some(doctor.id), now - Duration::days(5), Some(now + Duration::days(5)));

        let stats = course_stats_for_doctor(&conn, &doctor.id, &now).unwrap();
        assert_eq!(stats.get(&p1.id), Some(&CourseStats { total: 3, active: 2 }));
        assert!(!stats.contains_key(&p2.id));
    }
}

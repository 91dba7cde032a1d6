use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentCourse {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub name: String,
    pub main_symptom: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl TreatmentCourse {
    /// A course is active until its end date passes. Open-ended courses stay active.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.end_date.map_or(true, |end| end >= now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub schedule: Vec<String>,
}

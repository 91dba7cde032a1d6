use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DoseStatus;

/// One patient's record for one local day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_date: DateTime<Utc>,
    pub entry_day: NaiveDate,
    pub course_id: Option<Uuid>,
    pub medications: Vec<MedicationCheck>,
    pub medications_taken: Vec<DoseRecord>,
    pub symptoms: Vec<String>,
    pub symptom_level: Option<u8>,
    pub symptom_tags: Vec<String>,
    pub lifestyle_tags: Vec<String>,
    pub notes: Option<String>,
}

/// Free checklist item ("did I take X today").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationCheck {
    pub name: String,
    #[serde(default)]
    pub taken: bool,
}

/// Dose outcome for a prescribed course medication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseRecord {
    pub med_id: Option<Uuid>,
    pub status: DoseStatus,
}

impl HealthEntry {
    /// Scheduled doses as (taken, total).
    ///
    /// Prescribed dose records win; the free checklist is the fallback
    /// for entries logged without a course.
    pub fn dose_counts(&self) -> (u32, u32) {
        if !self.medications_taken.is_empty() {
            let taken = self
                .medications_taken
                .iter()
                .filter(|d| d.status == DoseStatus::Taken)
                .count() as u32;
            (taken, self.medications_taken.len() as u32)
        } else {
            let taken = self.medications.iter().filter(|m| m.taken).count() as u32;
            (taken, self.medications.len() as u32)
        }
    }

    /// Names of checklist medications marked taken.
    pub fn taken_medication_names(&self) -> Vec<String> {
        self.medications
            .iter()
            .filter(|m| m.taken)
            .map(|m| m.name.clone())
            .collect()
    }
}

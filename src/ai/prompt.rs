use chrono::NaiveDate;
use serde::Serialize;

use crate::adherence::Achievement;
use crate::models::{HealthEntry, MedicalCard, Medication, TreatmentCourse};

/// Entries used as context for the daily health fact.
const FACT_CONTEXT_ENTRIES: usize = 3;

/// One entry as handed to the correlation analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRecord {
    pub date: NaiveDate,
    pub symptom_level: Option<u8>,
    pub meds: Vec<String>,
    pub symptoms: Vec<String>,
    pub lifestyle: Vec<String>,
    pub notes: Option<String>,
}

impl From<&HealthEntry> for AnalyticsRecord {
    fn from(entry: &HealthEntry) -> Self {
        Self {
            date: entry.entry_day,
            symptom_level: entry.symptom_level,
            meds: entry.taken_medication_names(),
            symptoms: entry.symptom_tags.clone(),
            lifestyle: entry.lifestyle_tags.clone(),
            notes: entry.notes.clone(),
        }
    }
}

#[derive(Serialize)]
struct FactContext<'a> {
    symptoms: &'a [String],
    lifestyle: &'a [String],
}

pub fn build_achievement_prompt(achievement: Achievement) -> String {
    format!(
        r#"You are a motivating assistant inside a medical adherence app.
The user has just reached an important goal: {goal}

Write ONE short motivating compliment (two sentences at most).

Rules:
- Positive, encouraging tone
- No more than two sentences
- No preamble, only the congratulation
- Mention the achievement

Examples:
"Great work! Three days of logging in a row shows you take your health seriously."
"Impressive! You took your medication on time all week, and that discipline pays off.""#,
        goal = achievement.description()
    )
}

/// Health-fact prompt; `entries` newest first, only the first three are used.
pub fn build_health_fact_prompt(entries: &[HealthEntry]) -> String {
    let context: Vec<FactContext<'_>> = entries
        .iter()
        .take(FACT_CONTEXT_ENTRIES)
        .map(|e| FactContext {
            symptoms: &e.symptom_tags,
            lifestyle: &e.lifestyle_tags,
        })
        .collect();
    let context_json = serde_json::to_string(&context).unwrap_or_else(|_| "[]".into());

    format!(
        r#"You are an assistant inside a medical adherence app.
Give ONE interesting health fact (two or three sentences at most).

User context (for relevance):
{context_json}

Rules:
- A scientific fact about health, nutrition, sleep or lifestyle
- Two or three sentences at most
- No preamble, only the fact itself
- Practical and useful
- If the context mentions stress, sleep or coffee, make the fact about that

Good examples:
"Did you know? A 30-minute walk outdoors lowers stress levels noticeably."
"Sleep quality improves when you avoid bright screens for two hours before bed.""#
    )
}

pub fn build_analytics_prompt(records: &[AnalyticsRecord]) -> String {
    let data = serde_json::to_string(records).unwrap_or_else(|_| "[]".into());
    format!(
        r#"You are "Health Compass", an assistant inside a medical adherence app.
Analyse the user's health data (JSON below) and find 3-4 key correlations or conclusions.

User data:
{data}

Look for links such as:
- "Medication -> Symptom" (e.g. "Taking ibuprofen lowers the headache level...")
- "Lifestyle -> Symptom" (e.g. "Poor sleep correlates with fatigue...")
- "Triggers" (e.g. "Coffee after 4pm is associated with headaches...")

Answer only with a list of 3-4 points. No introduction such as "Here is your analysis".
Start every point with '• '."#
    )
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn join_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

/// Report prompt for one course; `entries` oldest first.
pub fn build_report_prompt(
    card: &MedicalCard,
    course: &TreatmentCourse,
    medications: &[Medication],
    entries: &[HealthEntry],
) -> String {
    let card_text = format!(
        "Patient medical card:\n\
         - Full name: {}\n\
         - Date of birth: {}\n\
         - Blood type: {}\n\
         - Allergies: {}\n\
         - Chronic diseases: {}",
        or_default(&card.full_name, "Not specified"),
        or_default(&card.birth_date, "Not specified"),
        or_default(&card.blood_type, "Not specified"),
        or_default(&card.allergies, "None"),
        or_default(&card.chronic_diseases, "None"),
    );

    let period_end = course
        .end_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "present".into());
    let course_text = format!(
        "Treatment course: {}\nMain symptom: {}\nPeriod: {} - {period_end}",
        course.name,
        course.main_symptom,
        course.start_date.format("%Y-%m-%d"),
    );

    let medications_text = medications
        .iter()
        .map(|m| format!("- {} ({}), schedule: {}", m.name, m.dosage, m.schedule.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");

    let entries_text = entries
        .iter()
        .map(|e| {
            let doses: Vec<String> = e
                .medications_taken
                .iter()
                .map(|d| d.status.as_str().to_string())
                .collect();
            let level = e
                .symptom_level
                .map(|l| l.to_string())
                .unwrap_or_else(|| "Not specified".into());
            format!(
                "Date: {}\nSymptoms: {}\nSymptom level: {level}/10\nDoses: {}\nSymptom tags: {}\nLifestyle: {}\nNotes: {}",
                e.entry_day,
                join_or(&e.symptoms, "Not specified"),
                join_or(&doses, "No data"),
                join_or(&e.symptom_tags, "None"),
                join_or(&e.lifestyle_tags, "None"),
                e.notes.as_deref().unwrap_or("None"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are the assistant behind a medical course report. Analyse the patient's data and treatment course.

{card_text}

{course_text}

Medications in the course:
{medications_text}

Patient entries by day:
{entries_text}

Your task:
1. Estimate medication adherence (as a percentage)
2. Describe how the main symptom developed
3. Find 3-4 correlations between medications or lifestyle and symptoms
4. Give short recommendations for the doctor

Answer in JSON:
{{
  "compliance": "adherence percentage",
  "symptomDynamics": "description of the symptom dynamics",
  "correlations": ["correlation 1", "correlation 2", "correlation 3"],
  "recommendations": "short recommendations"
}}"#
    )
}

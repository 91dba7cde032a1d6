//! Adherence arithmetic over a window of health entries.
//!
//! Everything here is pure: callers load the entries, pass "today" in
//! explicitly, and get numbers back. Days are server-local calendar days
//! (`HealthEntry::entry_day`).

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::models::HealthEntry;

/// Entries considered when looking for the dose-based achievement.
const ADHERENCE_WINDOW: usize = 7;
const HIGH_ADHERENCE_MIN_DOSES: u32 = 10;
const HIGH_ADHERENCE_RATIO: f64 = 0.9;
const IMPROVEMENT_MIN_ENTRIES: usize = 5;
const IMPROVEMENT_RATIO: f64 = 0.7;

/// Coarse milestone reached by the patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Achievement {
    ThreeDayLogging,
    WeeklyEntries,
    HighAdherence,
    SymptomImprovement,
}

impl Achievement {
    /// Phrase used when asking the model for a compliment.
    pub fn description(&self) -> &'static str {
        match self {
            Achievement::ThreeDayLogging => "three days in a row of health logging",
            Achievement::WeeklyEntries => "seven health entries this week",
            Achievement::HighAdherence => "excellent medication adherence (90%+)",
            Achievement::SymptomImprovement => {
                "a significant drop in symptom level over the last few days"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SymptomPoint {
    pub date: NaiveDate,
    pub level: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DayDoses {
    taken: u32,
    total: u32,
}

/// Doses per day; several entries on one day are summed.
fn doses_by_day(entries: &[HealthEntry]) -> BTreeMap<NaiveDate, DayDoses> {
    let mut days: BTreeMap<NaiveDate, DayDoses> = BTreeMap::new();
    for entry in entries {
        let (taken, total) = entry.dose_counts();
        let day = days.entry(entry.entry_day).or_default();
        day.taken += taken;
        day.total += total;
    }
    days
}

/// Count consecutive days ending at `today` for which `qualifies` holds.
fn trailing_run(today: NaiveDate, mut qualifies: impl FnMut(NaiveDate) -> bool) -> u32 {
    let mut streak = 0;
    let mut day = today;
    while qualifies(day) {
        streak += 1;
        match day.checked_sub_days(Days::new(1)) {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

/// Consecutive days ending today on which every scheduled dose was taken.
///
/// A day without an entry, without doses, or with any skipped dose
/// ends the streak.
pub fn adherence_streak(entries: &[HealthEntry], today: NaiveDate) -> u32 {
    let days = doses_by_day(entries);
    trailing_run(today, |day| {
        days.get(&day)
            .is_some_and(|d| d.total > 0 && d.taken == d.total)
    })
}

/// Consecutive days ending today with at least one entry.
pub fn logging_streak(entries: &[HealthEntry], today: NaiveDate) -> u32 {
    let days = doses_by_day(entries);
    trailing_run(today, |day| days.contains_key(&day))
}

/// Total (taken, scheduled) doses across all entries.
pub fn dose_totals(entries: &[HealthEntry]) -> (u32, u32) {
    entries.iter().fold((0, 0), |(taken, total), entry| {
        let (t, n) = entry.dose_counts();
        (taken + t, total + n)
    })
}

/// Share of taken doses as a rounded percentage, 0 when nothing was scheduled.
pub fn compliance_percent(entries: &[HealthEntry]) -> u8 {
    let (taken, total) = dose_totals(entries);
    if total == 0 {
        return 0;
    }
    ((taken as f64 / total as f64) * 100.0).round() as u8
}

fn mean_level(entries: &[HealthEntry]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    let sum: u32 = entries
        .iter()
        .map(|e| e.symptom_level.unwrap_or(0) as u32)
        .sum();
    sum as f64 / entries.len() as f64
}

/// First milestone reached, checked in priority order.
///
/// `entries` must be newest first, as loaded for the daily insight.
pub fn detect_achievement(entries: &[HealthEntry], today: NaiveDate) -> Option<Achievement> {
    if entries.len() < 3 {
        return None;
    }

    let newest_days: Vec<NaiveDate> = entries.iter().take(3).map(|e| e.entry_day).collect();
    let expected: Vec<NaiveDate> = (0..3)
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .collect();
    if expected.len() == 3 && expected.iter().all(|d| newest_days.contains(d)) {
        return Some(Achievement::ThreeDayLogging);
    }

    if entries.len() >= 7 {
        return Some(Achievement::WeeklyEntries);
    }

    let window = &entries[..entries.len().min(ADHERENCE_WINDOW)];
    let (taken, total) = dose_totals(window);
    if total >= HIGH_ADHERENCE_MIN_DOSES && taken as f64 / total as f64 >= HIGH_ADHERENCE_RATIO {
        return Some(Achievement::HighAdherence);
    }

    if entries.len() >= IMPROVEMENT_MIN_ENTRIES {
        let recent = mean_level(&entries[..3]);
        let older = mean_level(&entries[3..entries.len().min(6)]);
        if older > 0.0 && recent < older * IMPROVEMENT_RATIO {
            return Some(Achievement::SymptomImprovement);
        }
    }

    None
}

/// Symptom level per entry in the given order; a missing level reads as 0.
pub fn symptom_series(entries: &[HealthEntry]) -> Vec<SymptomPoint> {
    entries
        .iter()
        .map(|e| SymptomPoint {
            date: e.entry_day,
            level: e.symptom_level.unwrap_or(0),
        })
        .collect()
}

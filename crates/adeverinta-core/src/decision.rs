//! Submission instructions for a completed request.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::form::{FieldName, FieldValues};

/// Working days needed when the requester has already graduated.
pub const ETA_ABSOLVENT_DAYS: u32 = 5;

/// Working days needed for everyone else.
pub const ETA_DEFAULT_DAYS: u32 = 3;

/// What the requester does once the form is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
    pub eta_working_days: u32,
    pub text: String,
}

impl Instructions {
    /// Earliest pickup date for a request submitted on `submitted`,
    /// counting only Monday to Friday. Public holidays are not considered.
    pub fn earliest_pickup(&self, submitted: NaiveDate) -> NaiveDate {
        let mut date = submitted;
        let mut remaining = self.eta_working_days;
        while remaining > 0 {
            date += Duration::days(1);
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                remaining -= 1;
            }
        }
        date
    }
}

/// Turnaround in working days for the collected values.
pub fn eta_working_days(values: &FieldValues) -> u32 {
    match values.get(&FieldName::SituatieStudent) {
        Some(v) if v.trim().eq_ignore_ascii_case("absolvent") => ETA_ABSOLVENT_DAYS,
        _ => ETA_DEFAULT_DAYS,
    }
}

/// Deterministic instructions for a request in `ready` status.
pub fn compute_instructions(values: &FieldValues) -> Instructions {
    let eta = eta_working_days(values);
    let text = format!(
        "Depune cererea prin formularul online al secretariatului. \
         Adeverinta se ridica de la secretariatul facultatii, pe baza actului de identitate. \
         Timp estimat: minimum {} zile lucratoare.",
        eta
    );
    Instructions {
        eta_working_days: eta,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_situatie(value: &str) -> FieldValues {
        let mut values = FieldValues::new();
        values.insert(FieldName::SituatieStudent, value.to_string());
        values
    }

    #[test]
    fn test_absolvent_waits_five_days() {
        let instructions = compute_instructions(&with_situatie("absolvent"));
        assert_eq!(instructions.eta_working_days, 5);
        assert!(instructions.text.contains("5 zile lucratoare"));
    }

    #[test]
    fn test_everyone_else_waits_three_days() {
        for situatie in ["student in prezent", "retras"] {
            assert_eq!(compute_instructions(&with_situatie(situatie)).eta_working_days, 3);
        }
        assert_eq!(compute_instructions(&FieldValues::new()).eta_working_days, 3);
    }

    #[test]
    fn test_text_names_channel_and_pickup() {
        let text = compute_instructions(&FieldValues::new()).text;
        assert!(text.contains("formularul online"));
        assert!(text.contains("se ridica"));
    }

    #[test]
    fn test_pickup_skips_weekends() {
        let instructions = compute_instructions(&with_situatie("student in prezent"));
        // Thursday + 3 working days = Tuesday.
        let thursday = NaiveDate::from_ymd_opt(2024, 10, 3).unwrap();
        assert_eq!(
            instructions.earliest_pickup(thursday),
            NaiveDate::from_ymd_opt(2024, 10, 8).unwrap()
        );
        // Saturday + 5 working days = next Friday.
        let absolvent = compute_instructions(&with_situatie("absolvent"));
        let saturday = NaiveDate::from_ymd_opt(2024, 10, 5).unwrap();
        assert_eq!(
            absolvent.earliest_pickup(saturday),
            NaiveDate::from_ymd_opt(2024, 10, 11).unwrap()
        );
    }
}

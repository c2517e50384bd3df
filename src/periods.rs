// ISO-week period labels: parsing, bounds, and playoff/round-robin suffixes.

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use thiserror::Error;

/// Suffix appended to a week label for semifinal matches.
pub const SEMIFINAL_SUFFIX: &str = "-PO-SF";
/// Suffix appended to a week label for the final.
pub const FINAL_SUFFIX: &str = "-PO-F";
/// Suffix appended to a week label for the third-place game.
pub const THIRD_PLACE_SUFFIX: &str = "-PO-3P";

#[derive(Debug, Error)]
pub enum PeriodError {
    #[error("invalid week label `{0}`, expected YYYY-Www")]
    InvalidLabel(String),
}

/// ISO week label ("2026-W34") for a date. The year is the ISO week-year,
/// which can differ from the calendar year around New Year.
pub fn iso_week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

/// Label of the current UTC week.
pub fn current_week_label() -> String {
    iso_week_label(Utc::now().date_naive())
}

/// Monday and Sunday of the week named by `label`. Suffixed labels are not
/// accepted here; strip them with [`base_week`] first.
pub fn iso_week_bounds(label: &str) -> Result<(NaiveDate, NaiveDate), PeriodError> {
    let invalid = || PeriodError::InvalidLabel(label.to_string());
    let (year_part, week_part) = label.split_once("-W").ok_or_else(invalid)?;
    let year: i32 = year_part.parse().map_err(|_| invalid())?;
    let week: u32 = week_part.parse().map_err(|_| invalid())?;
    let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)?;
    Ok((monday, monday + Duration::days(6)))
}

/// Labels for `count` consecutive weeks starting with the week of `from`.
pub fn next_weeks(from: NaiveDate, count: usize) -> Vec<String> {
    let monday = from - Duration::days(i64::from(from.weekday().num_days_from_monday()));
    (0..count)
        .map(|i| iso_week_label(monday + Duration::days(7 * i as i64)))
        .collect()
}

/// Strip any round-robin ("+WkN") or playoff ("-PO-*") suffix, leaving the
/// plain ISO week the label was derived from.
pub fn base_week(label: &str) -> &str {
    let cut = [label.find("+Wk"), label.find("-PO-")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(label.len());
    &label[..cut]
}

/// True for any playoff-round label (semifinal, final, or third place).
pub fn is_playoff_week(label: &str) -> bool {
    label.ends_with(SEMIFINAL_SUFFIX)
        || label.ends_with(FINAL_SUFFIX)
        || label.ends_with(THIRD_PLACE_SUFFIX)
}

/// Round-robin label for round `round` (1-based) on top of a base week.
pub fn round_robin_label(base: &str, round: usize) -> String {
    format!("{base}+Wk{round}")
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn label_is_zero_padded() {
        assert_eq!(iso_week_label(date(2026, 8, 23)), "2026-W34");
        assert_eq!(iso_week_label(date(2026, 1, 5)), "2026-W02");
    }

    #[test]
    fn label_uses_iso_week_year_at_boundary() {
        // Dec 29 2025 is the Monday of ISO week 2026-W01.
        assert_eq!(iso_week_label(date(2025, 12, 29)), "2026-W01");
        assert_eq!(iso_week_label(date(2025, 12, 28)), "2025-W52");
    }

    #[test]
    fn bounds_are_monday_through_sunday() {
        let (start, end) = iso_week_bounds("2026-W34").unwrap();
        assert_eq!(start, date(2026, 8, 17));
        assert_eq!(end, date(2026, 8, 23));
        assert_eq!(start.weekday(), Weekday::Mon);
        assert_eq!(end.weekday(), Weekday::Sun);
    }

    #[test]
    fn bounds_round_trip_contains_source_date() {
        for d in [date(2026, 8, 23), date(2026, 1, 1), date(2025, 12, 31)] {
            let label = iso_week_label(d);
            let (start, end) = iso_week_bounds(&label).unwrap();
            assert!(start <= d && d <= end, "{label} bounds should contain {d}");
        }
    }

    #[test]
    fn current_week_bounds_contain_today() {
        let today = Utc::now().date_naive();
        let (start, end) = iso_week_bounds(&current_week_label()).unwrap();
        assert!(start <= today && today <= end);
    }

    #[test]
    fn bounds_reject_malformed_labels() {
        for bad in ["", "2026W05", "2026-W", "2026-Wxx", "2026-W99", "no-week-here"] {
            assert!(iso_week_bounds(bad).is_err(), "`{bad}` should be rejected");
        }
    }

    #[test]
    fn next_weeks_walks_consecutive_labels() {
        let labels = next_weeks(date(2025, 12, 22), 3);
        assert_eq!(labels, vec!["2025-W52", "2026-W01", "2026-W02"]);
        // Starting mid-week still yields that week first.
        let labels = next_weeks(date(2026, 8, 20), 2);
        assert_eq!(labels, vec!["2026-W34", "2026-W35"]);
    }

    #[test]
    fn base_week_strips_suffixes() {
        assert_eq!(base_week("2026-W34"), "2026-W34");
        assert_eq!(base_week("2026-W34+Wk3"), "2026-W34");
        assert_eq!(base_week("2026-W34-PO-SF"), "2026-W34");
        assert_eq!(base_week("2026-W34-PO-3P"), "2026-W34");
    }

    #[test]
    fn playoff_weeks_detected_by_suffix() {
        assert!(is_playoff_week("2026-W34-PO-SF"));
        assert!(is_playoff_week("2026-W34-PO-F"));
        assert!(is_playoff_week("2026-W34-PO-3P"));
        assert!(!is_playoff_week("2026-W34"));
        assert!(!is_playoff_week("2026-W34+Wk3"));
    }

    #[test]
    fn round_robin_labels_are_one_based() {
        assert_eq!(round_robin_label("2026-W34", 1), "2026-W34+Wk1");
        assert_eq!(round_robin_label("2026-W34", 12), "2026-W34+Wk12");
    }
}

//! Windowed averages over dated entries.

use chrono::{Duration, NaiveDate};
use medsage_core::{round1, Event};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric fields averaged for lifestyle entries.
pub const LIFESTYLE_FIELDS: &[&str] = &["sleep_hours", "exercise_minutes", "mood", "stress_level"];

/// Numeric fields averaged for daily health entries.
pub const DAILY_HEALTH_FIELDS: &[&str] = &["energy_level", "sleep_quality", "physical_activity"];

pub const LIFESTYLE_NO_DATA: &str = "No lifestyle data available for this period";
pub const DAILY_HEALTH_NO_DATA: &str = "No health data available";

/// Result of a rollup. An empty window is a normal outcome, not an error:
/// `total_entries` is 0 and `message` says so.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupSummary {
    pub period_days: u32,
    pub total_entries: usize,
    /// Mean of present values per field, one decimal place. `None` when no
    /// entry in the window carries the field.
    pub averages: BTreeMap<String, Option<f64>>,
    /// Entries inside the window, oldest first.
    pub entries: Vec<Event>,
    pub message: Option<String>,
}

impl RollupSummary {
    pub fn has_data(&self) -> bool {
        self.total_entries > 0
    }

    pub fn average(&self, field: &str) -> Option<f64> {
        self.averages.get(field).copied().flatten()
    }
}

/// Computes bounded-window averages over a fixed set of numeric fields.
#[derive(Debug, Clone, Copy)]
pub struct AggregateRollup {
    fields: &'static [&'static str],
    no_data_message: &'static str,
}

impl AggregateRollup {
    pub const fn new(fields: &'static [&'static str], no_data_message: &'static str) -> Self {
        Self {
            fields,
            no_data_message,
        }
    }

    pub const fn lifestyle() -> Self {
        Self::new(LIFESTYLE_FIELDS, LIFESTYLE_NO_DATA)
    }

    pub const fn daily_health() -> Self {
        Self::new(DAILY_HEALTH_FIELDS, DAILY_HEALTH_NO_DATA)
    }

    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    /// Summarize the entries dated on or after `today - window_days`.
    ///
    /// A window reaching past the earliest representable date covers every
    /// entry.
    ///
    /// The output depends only on the arguments; calling twice with the same
    /// inputs yields identical summaries.
    pub fn summarize(&self, events: &[Event], window_days: u32, today: NaiveDate) -> RollupSummary {
        let cutoff = window_start(today, window_days);
        let mut entries: Vec<Event> = events.iter().filter(|e| e.date >= cutoff).cloned().collect();
        entries.sort_by_key(|e| e.date);

        let averages = self
            .fields
            .iter()
            .map(|field| (field.to_string(), mean_present(&entries, field)))
            .collect();

        let message = entries.is_empty().then(|| self.no_data_message.to_string());

        RollupSummary {
            period_days: window_days,
            total_entries: entries.len(),
            averages,
            entries,
            message,
        }
    }
}

/// First day of a `days`-long window ending on `today`, clamped to the
/// earliest representable date.
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Mean over entries that carry the field; absent values count for nothing.
fn mean_present(entries: &[Event], field: &str) -> Option<f64> {
    let (sum, count) = entries
        .iter()
        .filter_map(|e| e.numeric(field))
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| round1(sum / count as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use medsage_core::{EventPayload, LifestyleEntry, UserId};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn lifestyle(date: &str, sleep: Option<f64>, mood: Option<f64>) -> Event {
        Event::new(
            UserId::from("u1"),
            day(date),
            EventPayload::Lifestyle(LifestyleEntry {
                sleep_hours: sleep,
                mood,
                ..Default::default()
            }),
            Utc::now(),
        )
    }

    #[test]
    fn test_empty_window_reports_no_data() {
        let events = vec![lifestyle("2024-01-01", Some(7.0), None)];
        let summary = AggregateRollup::lifestyle().summarize(&events, 7, day("2024-03-10"));
        assert_eq!(summary.total_entries, 0);
        assert!(!summary.has_data());
        assert_eq!(summary.message.as_deref(), Some(LIFESTYLE_NO_DATA));
        assert!(summary.averages.values().all(Option::is_none));
    }

    #[test]
    fn test_absent_values_are_not_zero() {
        let events = vec![
            lifestyle("2024-03-08", Some(6.0), None),
            lifestyle("2024-03-09", None, Some(8.0)),
            lifestyle("2024-03-10", Some(7.0), None),
        ];
        let summary = AggregateRollup::lifestyle().summarize(&events, 7, day("2024-03-10"));
        assert_eq!(summary.total_entries, 3);
        assert_eq!(summary.average("sleep_hours"), Some(6.5));
        assert_eq!(summary.average("mood"), Some(8.0));
        assert_eq!(summary.average("exercise_minutes"), None);
        assert_eq!(summary.averages.get("stress_level"), Some(&None));
        assert!(summary.message.is_none());
    }

    #[test]
    fn test_window_includes_cutoff_day_and_sorts() {
        let events = vec![
            lifestyle("2024-03-10", Some(8.0), None),
            lifestyle("2024-03-03", Some(6.0), None),
            lifestyle("2024-03-02", Some(1.0), None),
        ];
        let summary = AggregateRollup::lifestyle().summarize(&events, 7, day("2024-03-10"));
        let dates: Vec<NaiveDate> = summary.entries.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![day("2024-03-03"), day("2024-03-10")]);
        assert_eq!(summary.average("sleep_hours"), Some(7.0));
    }

    #[test]
    fn test_average_rounds_to_one_decimal() {
        let events = vec![
            lifestyle("2024-03-08", Some(7.0), None),
            lifestyle("2024-03-09", Some(7.0), None),
            lifestyle("2024-03-10", Some(8.0), None),
        ];
        let summary = AggregateRollup::lifestyle().summarize(&events, 7, day("2024-03-10"));
        assert_eq!(summary.average("sleep_hours"), Some(7.3));
    }

    #[test]
    fn test_window_longer_than_calendar_covers_everything() {
        let events = vec![
            lifestyle("0001-01-01", Some(5.0), None),
            lifestyle("2024-03-10", Some(7.0), None),
        ];
        let today = day("2024-03-10");
        let summary = AggregateRollup::lifestyle().summarize(&events, u32::MAX, today);
        assert_eq!(summary.period_days, u32::MAX);
        assert_eq!(summary.total_entries, 2);
        assert_eq!(summary.average("sleep_hours"), Some(6.0));

        let empty = AggregateRollup::lifestyle().summarize(&[], u32::MAX, today);
        assert_eq!(empty.message.as_deref(), Some(LIFESTYLE_NO_DATA));
        assert_eq!(window_start(today, u32::MAX), NaiveDate::MIN);
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let events = vec![
            lifestyle("2024-03-08", Some(6.2), Some(4.0)),
            lifestyle("2024-03-09", Some(7.9), None),
        ];
        let rollup = AggregateRollup::lifestyle();
        let a = serde_json::to_string(&rollup.summarize(&events, 7, day("2024-03-10"))).unwrap();
        let b = serde_json::to_string(&rollup.summarize(&events, 7, day("2024-03-10"))).unwrap();
        assert_eq!(a, b);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use medsage_core::{EventPayload, LifestyleEntry, UserId};
    use medsage_test_utils::generators::arb_lifestyle_entry;
    use proptest::prelude::*;

    fn event(offset: i64, entry: LifestyleEntry) -> Event {
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        Event::new(
            UserId::from("prop"),
            today - Duration::days(offset),
            EventPayload::Lifestyle(entry),
            Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap(),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Averages equal the mean of present values only.
        #[test]
        fn prop_average_matches_present_mean(
            entries in prop::collection::vec((0i64..7, arb_lifestyle_entry()), 1..20)
        ) {
            let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
            let events: Vec<Event> = entries.iter().cloned().map(|(o, e)| event(o, e)).collect();
            let summary = AggregateRollup::lifestyle().summarize(&events, 7, today);

            let mut oldest_first = entries.clone();
            oldest_first.sort_by_key(|(offset, _)| std::cmp::Reverse(*offset));
            let present: Vec<f64> = oldest_first.iter().filter_map(|(_, e)| e.sleep_hours).collect();
            let expected = if present.is_empty() {
                None
            } else {
                Some(round1(present.iter().sum::<f64>() / present.len() as f64))
            };
            prop_assert_eq!(summary.average("sleep_hours"), expected);
            prop_assert_eq!(summary.total_entries, entries.len());
        }

        /// Adding an entry with every field absent changes no average.
        #[test]
        fn prop_all_absent_entry_is_neutral(
            entries in prop::collection::vec((0i64..7, arb_lifestyle_entry()), 0..20),
            offset in 0i64..7
        ) {
            let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
            let rollup = AggregateRollup::lifestyle();
            let mut events: Vec<Event> = entries.into_iter().map(|(o, e)| event(o, e)).collect();
            let before = rollup.summarize(&events, 7, today);

            events.push(event(offset, LifestyleEntry::default()));
            let after = rollup.summarize(&events, 7, today);

            prop_assert_eq!(before.averages, after.averages);
            prop_assert_eq!(after.total_entries, before.total_entries + 1);
        }
    }
}

//! Cycle length statistics and next-start projection.

use chrono::{Duration, NaiveDate};
use medsage_core::{round1, Confidence, ConfidenceThresholds, CycleConfig, StatsError};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Projection derived from recent start dates. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CyclePrediction {
    pub next_period_date: NaiveDate,
    pub ovulation_date: NaiveDate,
    pub fertile_window_start: NaiveDate,
    pub fertile_window_end: NaiveDate,
    /// Mean gap in days, one decimal place.
    pub average_cycle_length: f64,
    /// Population standard deviation of the gaps, one decimal place.
    pub cycle_variation: f64,
    pub confidence: Confidence,
    /// Number of gaps the statistics were computed from.
    pub cycles_analyzed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CycleStatisticsEngine {
    config: CycleConfig,
}

impl CycleStatisticsEngine {
    pub fn new(config: CycleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Project the next start from ISO dates ordered newest first.
    ///
    /// Only the first `max_history` entries are considered. Entries that do
    /// not parse as `YYYY-MM-DD` are skipped: a gap is formed only between
    /// adjacent entries that both parse.
    ///
    /// # Errors
    /// `InsufficientData` when fewer than `min_starts` entries parse, or when
    /// no adjacent pair yields a gap.
    pub fn predict<S: AsRef<str>>(&self, starts: &[S]) -> Result<CyclePrediction, StatsError> {
        let parsed: Vec<Option<NaiveDate>> = starts
            .iter()
            .take(self.config.max_history)
            .map(|s| NaiveDate::parse_from_str(s.as_ref().trim(), DATE_FORMAT).ok())
            .collect();
        self.project(&parsed)
    }

    /// Same as [`CycleStatisticsEngine::predict`] for already-parsed dates.
    pub fn predict_dates(&self, starts: &[NaiveDate]) -> Result<CyclePrediction, StatsError> {
        let parsed: Vec<Option<NaiveDate>> = starts
            .iter()
            .take(self.config.max_history)
            .copied()
            .map(Some)
            .collect();
        self.project(&parsed)
    }

    fn project(&self, starts: &[Option<NaiveDate>]) -> Result<CyclePrediction, StatsError> {
        let valid = starts.iter().flatten().count();
        if valid < self.config.min_starts {
            return Err(StatsError::InsufficientData {
                required: self.config.min_starts,
                found: valid,
            });
        }

        let gaps: Vec<f64> = starts
            .windows(2)
            .filter_map(|pair| match (pair[0], pair[1]) {
                (Some(newer), Some(older)) => Some((newer - older).num_days() as f64),
                _ => None,
            })
            .collect();
        // Parsable dates separated by unparsable ones form no gap.
        let most_recent = match starts.iter().flatten().next() {
            Some(date) if !gaps.is_empty() => *date,
            _ => {
                return Err(StatsError::InsufficientData {
                    required: self.config.min_starts,
                    found: 0,
                })
            }
        };

        let n = gaps.len() as f64;
        let mean = gaps.iter().sum::<f64>() / n;
        let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        // f64::round breaks ties away from zero.
        let next_period_date = shift(most_recent, mean.round() as i64, "next period date")?;
        let ovulation_date =
            shift(next_period_date, -self.config.luteal_phase_days, "ovulation date")?;

        Ok(CyclePrediction {
            next_period_date,
            ovulation_date,
            fertile_window_start: shift(
                ovulation_date,
                -self.config.fertile_lead_days,
                "fertile window start",
            )?,
            fertile_window_end: shift(
                ovulation_date,
                self.config.fertile_trail_days,
                "fertile window end",
            )?,
            average_cycle_length: round1(mean),
            cycle_variation: round1(std_dev),
            confidence: classify(std_dev, &self.config.thresholds),
            cycles_analyzed: gaps.len(),
        })
    }
}

/// `date` moved by `days`, or `DateOutOfRange` past the calendar's limits.
fn shift(date: NaiveDate, days: i64, what: &str) -> Result<NaiveDate, StatsError> {
    Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or_else(|| StatsError::DateOutOfRange {
            reason: format!("{} is {} days from {}", what, days, date),
        })
}

/// Map a cycle-length deviation to a confidence label.
pub fn classify(std_dev: f64, thresholds: &ConfidenceThresholds) -> Confidence {
    if std_dev < thresholds.high_below {
        Confidence::High
    } else if std_dev < thresholds.medium_below {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

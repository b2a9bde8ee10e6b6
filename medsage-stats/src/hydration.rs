//! Daily water intake summary.

use chrono::NaiveDate;
use medsage_core::{round1, Event, EventPayload, HydrationConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrationSummary {
    pub date: NaiveDate,
    pub total_ml: u32,
    pub target_ml: u32,
    /// Share of the target reached, in percent with one decimal place.
    pub percentage: f64,
    /// Total expressed in 8oz glasses, rounded to the nearest glass.
    pub glasses: u32,
    pub entries: Vec<Event>,
}

impl HydrationSummary {
    /// Summarize the water entries logged on `date`. Other dates and kinds are ignored.
    pub fn from_entries(date: NaiveDate, entries: Vec<Event>, config: &HydrationConfig) -> Self {
        let entries: Vec<Event> = entries
            .into_iter()
            .filter(|e| e.date == date && matches!(e.payload, EventPayload::Water(_)))
            .collect();
        let total_ml: u32 = entries
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::Water(w) => Some(w.amount_ml),
                _ => None,
            })
            .fold(0u32, u32::saturating_add);

        let percentage = if config.daily_target_ml > 0 {
            round1(f64::from(total_ml) / f64::from(config.daily_target_ml) * 100.0)
        } else {
            0.0
        };
        let glasses = if config.ml_per_glass > 0 {
            (f64::from(total_ml) / f64::from(config.ml_per_glass)).round() as u32
        } else {
            0
        };

        Self {
            date,
            total_ml,
            target_ml: config.daily_target_ml,
            percentage,
            glasses,
            entries,
        }
    }

    pub fn target_reached(&self) -> bool {
        self.total_ml >= self.target_ml
    }
}

//! Validated journal writes.
//!
//! `HealthJournal` is the write side of the event log: it checks each entry,
//! stamps it with the injected clock and routes it to `upsert_daily` or
//! `append` according to its kind.

use crate::EventStore;
use chrono::{NaiveDate, NaiveTime, Timelike};
use medsage_core::{
    Clock, DailyHealthEntry, EntityId, Event, EventPayload, FlowIntensity, LifestyleEntry, MealEntry,
    MedicationDoseEntry, MedsageResult, PeriodEntry, SymptomEntry, UserId, ValidationError,
    WaterEntry,
};
use std::sync::Arc;
use tracing::debug;

const RATING_MIN: f64 = 1.0;
const RATING_MAX: f64 = 10.0;

pub struct HealthJournal {
    events: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
}

impl HealthJournal {
    pub fn new(events: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { events, clock }
    }

    fn event(&self, user_id: &UserId, date: NaiveDate, payload: EventPayload) -> Event {
        Event::new(user_id.clone(), date, payload, self.clock.now())
    }

    /// Log the day's lifestyle metrics, replacing any entry already logged for that date.
    ///
    /// # Errors
    /// All four metrics are required. Sleep must be within 0-24 hours,
    /// exercise non-negative, mood and stress within 1-10.
    pub async fn log_daily_lifestyle(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        entry: LifestyleEntry,
    ) -> MedsageResult<EntityId> {
        let sleep = require("sleep_hours", entry.sleep_hours)?;
        let exercise = require("exercise_minutes", entry.exercise_minutes)?;
        let mood = require("mood", entry.mood)?;
        let stress = require("stress_level", entry.stress_level)?;
        check_range("sleep_hours", sleep, 0.0, 24.0)?;
        check_range("exercise_minutes", exercise, 0.0, 1440.0)?;
        check_range("mood", mood, RATING_MIN, RATING_MAX)?;
        check_range("stress_level", stress, RATING_MIN, RATING_MAX)?;

        let id = self
            .events
            .upsert_daily(self.event(user_id, date, EventPayload::Lifestyle(entry)))
            .await?;
        debug!(user_id = %user_id, %date, "Lifestyle entry logged");
        Ok(id)
    }

    /// Log the day's health ratings, replacing any entry already logged for that date.
    pub async fn log_daily_health(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        entry: DailyHealthEntry,
    ) -> MedsageResult<EntityId> {
        for (field, value) in [
            ("energy_level", entry.energy_level),
            ("sleep_quality", entry.sleep_quality),
            ("physical_activity", entry.physical_activity),
        ] {
            if let Some(v) = value {
                check_range(field, v, RATING_MIN, RATING_MAX)?;
            }
        }

        let id = self
            .events
            .upsert_daily(self.event(user_id, date, EventPayload::DailyHealth(entry)))
            .await?;
        debug!(user_id = %user_id, %date, "Daily health entry logged");
        Ok(id)
    }

    /// Log a period. The duration is derived (inclusive) once the end date is known.
    pub async fn log_period(
        &self,
        user_id: &UserId,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        flow: FlowIntensity,
        notes: impl Into<String>,
    ) -> MedsageResult<EntityId> {
        let duration_days = match end_date {
            Some(end) if end < start_date => {
                return Err(ValidationError::InvalidValue {
                    field: "end_date".to_string(),
                    reason: format!("{} is before start date {}", end, start_date),
                }
                .into());
            }
            Some(end) => u32::try_from((end - start_date).num_days() + 1).ok(),
            None => None,
        };

        let entry = PeriodEntry {
            start_date,
            end_date,
            flow,
            notes: notes.into(),
            duration_days,
        };
        self.events
            .append(self.event(user_id, start_date, EventPayload::Period(entry)))
            .await
    }

    pub async fn log_symptom(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        symptom_type: &str,
        severity: u8,
        notes: impl Into<String>,
    ) -> MedsageResult<EntityId> {
        let symptom_type = symptom_type.trim();
        if symptom_type.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "symptom_type".to_string(),
            }
            .into());
        }
        check_range("severity", f64::from(severity), RATING_MIN, RATING_MAX)?;

        let entry = SymptomEntry {
            symptom_type: symptom_type.to_string(),
            severity,
            notes: notes.into(),
        };
        self.events
            .append(self.event(user_id, date, EventPayload::Symptom(entry)))
            .await
    }

    /// Log a glass of water. Without a time, the current minute is used.
    pub async fn log_water_intake(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        time: Option<NaiveTime>,
        amount_ml: u32,
    ) -> MedsageResult<EntityId> {
        if amount_ml == 0 {
            return Err(ValidationError::InvalidValue {
                field: "amount_ml".to_string(),
                reason: "Amount must be positive".to_string(),
            }
            .into());
        }

        let time = time.unwrap_or_else(|| current_minute(self.clock.now().time()));
        let event = self
            .event(user_id, date, EventPayload::Water(WaterEntry { amount_ml }))
            .with_time(time);
        self.events.append(event).await
    }

    pub async fn log_meal(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        meal_type: &str,
        description: impl Into<String>,
        calories: Option<u32>,
    ) -> MedsageResult<EntityId> {
        let meal_type = meal_type.trim().to_lowercase();
        if meal_type.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "meal_type".to_string(),
            }
            .into());
        }

        let entry = MealEntry {
            meal_type,
            description: description.into(),
            calories,
        };
        self.events
            .append(self.event(user_id, date, EventPayload::Meal(entry)))
            .await
    }

    pub async fn log_medication_dose(
        &self,
        user_id: &UserId,
        medication_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        taken: bool,
    ) -> MedsageResult<EntityId> {
        if medication_id.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "medication_id".to_string(),
            }
            .into());
        }

        let entry = MedicationDoseEntry {
            medication_id: medication_id.to_string(),
            taken,
        };
        let event = self
            .event(user_id, date, EventPayload::MedicationDose(entry))
            .with_time(time);
        self.events.append(event).await
    }
}

fn require(field: &str, value: Option<f64>) -> Result<f64, ValidationError> {
    value.ok_or_else(|| ValidationError::RequiredFieldMissing {
        field: field.to_string(),
    })
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        })
    }
}

fn current_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

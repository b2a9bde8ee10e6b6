//! Core entity structures

use crate::{
    new_entity_id, AppointmentStatus, Confidence, EntityId, EventKind, FlowIntensity, ReportId, Timestamp,
    UserId,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// EVENTS
// ============================================================================

/// A dated, typed health fact logged by a user.
///
/// Daily rollup kinds (lifestyle, daily health) are keyed by `(user_id, date)`
/// in the store; every other kind is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EntityId,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub payload: EventPayload,
    pub created_at: Timestamp,
}

impl Event {
    pub fn new(user_id: UserId, date: NaiveDate, payload: EventPayload, created_at: Timestamp) -> Self {
        Self {
            event_id: new_entity_id(),
            user_id,
            date,
            time: None,
            payload,
            created_at,
        }
    }

    pub fn with_time(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Numeric value of a named payload field, if the payload has it and it is present.
    pub fn numeric(&self, field: &str) -> Option<f64> {
        self.payload.numeric(field)
    }
}

/// Kind-specific payload of an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Lifestyle(LifestyleEntry),
    DailyHealth(DailyHealthEntry),
    Period(PeriodEntry),
    Symptom(SymptomEntry),
    Water(WaterEntry),
    Meal(MealEntry),
    MedicationDose(MedicationDoseEntry),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Lifestyle(_) => EventKind::Lifestyle,
            Self::DailyHealth(_) => EventKind::DailyHealth,
            Self::Period(_) => EventKind::Period,
            Self::Symptom(_) => EventKind::Symptom,
            Self::Water(_) => EventKind::Water,
            Self::Meal(_) => EventKind::Meal,
            Self::MedicationDose(_) => EventKind::MedicationDose,
        }
    }

    pub fn numeric(&self, field: &str) -> Option<f64> {
        match self {
            Self::Lifestyle(e) => match field {
                "sleep_hours" => e.sleep_hours,
                "exercise_minutes" => e.exercise_minutes,
                "mood" => e.mood,
                "stress_level" => e.stress_level,
                _ => None,
            },
            Self::DailyHealth(e) => match field {
                "energy_level" => e.energy_level,
                "sleep_quality" => e.sleep_quality,
                "physical_activity" => e.physical_activity,
                _ => None,
            },
            Self::Period(e) => match field {
                "duration_days" => e.duration_days.map(f64::from),
                _ => None,
            },
            Self::Symptom(e) => match field {
                "severity" => Some(f64::from(e.severity)),
                _ => None,
            },
            Self::Water(e) => match field {
                "amount_ml" => Some(f64::from(e.amount_ml)),
                _ => None,
            },
            Self::Meal(e) => match field {
                "calories" => e.calories.map(f64::from),
                _ => None,
            },
            Self::MedicationDose(_) => None,
        }
    }
}

/// Daily lifestyle metrics. Mood and stress are on a 1-10 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifestyleEntry {
    pub sleep_hours: Option<f64>,
    pub exercise_minutes: Option<f64>,
    pub mood: Option<f64>,
    pub stress_level: Option<f64>,
}

/// Daily health ratings, each on a 1-10 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyHealthEntry {
    pub energy_level: Option<f64>,
    pub sleep_quality: Option<f64>,
    pub physical_activity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodEntry {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub flow: FlowIntensity,
    pub notes: String,
    /// Inclusive length in days, present once the end date is known.
    pub duration_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomEntry {
    pub symptom_type: String,
    pub severity: u8,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterEntry {
    pub amount_ml: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealEntry {
    pub meal_type: String,
    pub description: String,
    pub calories: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationDoseEntry {
    pub medication_id: String,
    pub taken: bool,
}

// ============================================================================
// MEDICATIONS AND APPOINTMENTS
// ============================================================================

/// A prescribed medication. Doses taken against it are logged as
/// [`MedicationDoseEntry`] events carrying its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub medication_id: EntityId,
    pub user_id: UserId,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: String,
    pub active: bool,
    pub added_at: Timestamp,
}

impl Medication {
    /// Active, and its course has not ended before `date`.
    pub fn is_current(&self, date: NaiveDate) -> bool {
        self.active && self.end_date.map_or(true, |end| end >= date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: EntityId,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub doctor: String,
    pub purpose: String,
    pub location: String,
    pub notes: String,
    #[serde(default)]
    pub status: AppointmentStatus,
    pub created_at: Timestamp,
}

// ============================================================================
// PROFILE
// ============================================================================

/// Structured per-user attributes, owned by the external profile collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub user_id: UserId,
    #[serde(default)]
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub medical_history: MedicalHistory,
    #[serde(default)]
    pub lifestyle: LifestyleHabits,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalHistory {
    #[serde(default)]
    pub chronic_conditions: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifestyleHabits {
    pub smoking: Option<String>,
    pub alcohol: Option<String>,
    pub exercise_frequency: Option<String>,
    pub diet_type: Option<String>,
}

// ============================================================================
// REPORTS
// ============================================================================

/// A named medical document with its extracted plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDigest {
    pub report_id: ReportId,
    pub user_id: UserId,
    pub name: String,
    pub report_type: String,
    /// Empty when extraction produced nothing.
    pub extracted_text: String,
    pub uploaded_at: Timestamp,
}

// ============================================================================
// QUERIES AND CONVERSATIONS
// ============================================================================

/// Outcome of one question put to the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub answer: String,
    pub confidence: Confidence,
    pub timestamp: Timestamp,
    pub reports_used: usize,
}

/// A persisted question/answer exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: EntityId,
    pub user_id: UserId,
    pub question: String,
    pub answer: String,
    pub confidence: Confidence,
    pub reports_used: usize,
    pub created_at: Timestamp,
}

impl ConversationRecord {
    pub fn from_result(user_id: UserId, question: &str, result: &QueryResult, created_at: Timestamp) -> Self {
        Self {
            conversation_id: new_entity_id(),
            user_id,
            question: question.to_string(),
            answer: result.answer.clone(),
            confidence: result.confidence,
            reports_used: result.reports_used,
            created_at,
        }
    }
}

/// One passage returned by a knowledge retriever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    pub text: String,
    pub source: Option<String>,
}

impl KnowledgeSnippet {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

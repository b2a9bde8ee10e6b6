//! Enum types for MedSage records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CONFIDENCE
// ============================================================================

/// How an answer or a prediction was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Generated by the backend, or a prediction over a regular cycle
    High,
    /// Prediction over a moderately irregular cycle
    Medium,
    /// Fallback answer, or a prediction over an irregular cycle
    Low,
    /// The pipeline hit an unexpected failure
    Error,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "error" => Ok(Self::Error),
            _ => Err(EnumParseError::new("Confidence", s)),
        }
    }
}

// ============================================================================
// EVENT KIND
// ============================================================================

/// Kind tag of a logged health event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Period,
    Symptom,
    Lifestyle,
    DailyHealth,
    Water,
    Meal,
    MedicationDose,
}

impl EventKind {
    /// Daily rollup kinds hold at most one entry per (user, date).
    pub fn is_daily_rollup(&self) -> bool {
        matches!(self, Self::Lifestyle | Self::DailyHealth)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Period => "period",
            Self::Symptom => "symptom",
            Self::Lifestyle => "lifestyle",
            Self::DailyHealth => "daily_health",
            Self::Water => "water",
            Self::Meal => "meal",
            Self::MedicationDose => "medication_dose",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "period" => Ok(Self::Period),
            "symptom" => Ok(Self::Symptom),
            "lifestyle" => Ok(Self::Lifestyle),
            "daily_health" => Ok(Self::DailyHealth),
            "water" => Ok(Self::Water),
            "meal" => Ok(Self::Meal),
            "medication_dose" => Ok(Self::MedicationDose),
            _ => Err(EnumParseError::new("EventKind", s)),
        }
    }
}

// ============================================================================
// PERIOD FLOW
// ============================================================================

/// Flow intensity recorded with a period entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowIntensity {
    Light,
    #[default]
    Medium,
    Heavy,
}

impl FromStr for FlowIntensity {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "medium" => Ok(Self::Medium),
            "heavy" => Ok(Self::Heavy),
            _ => Err(EnumParseError::new("FlowIntensity", s)),
        }
    }
}

// ============================================================================
// APPOINTMENT STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(EnumParseError::new("AppointmentStatus", s)),
        }
    }
}

// ============================================================================
// PARSE ERROR
// ============================================================================

/// Error parsing one of the enums above from its string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub enum_name: &'static str,
    pub input: String,
}

impl EnumParseError {
    fn new(enum_name: &'static str, input: &str) -> Self {
        Self {
            enum_name,
            input: input.to_string(),
        }
    }
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.enum_name, self.input)
    }
}

impl std::error::Error for EnumParseError {}

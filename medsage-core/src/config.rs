//! Configuration types
//!
//! Every tunable constant of the query pipeline and the statistics engines
//! lives here with its documented default. `MedsageConfig::default()` reproduces
//! the stock behaviour exactly; overrides come from TOML or `MEDSAGE_*`
//! environment variables.

use crate::{ConfigError, MedsageResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Confidence cut-offs applied to the standard deviation of cycle lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    /// Deviation strictly below this is `high`.
    pub high_below: f64,
    /// Deviation strictly below this (and not `high`) is `medium`; anything else is `low`.
    pub medium_below: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high_below: 3.0,
            medium_below: 5.0,
        }
    }
}

/// Cycle projection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Most recent start dates considered.
    pub max_history: usize,
    /// Minimum start dates required for a projection.
    pub min_starts: usize,
    /// Days from ovulation to the next start.
    pub luteal_phase_days: i64,
    /// Days the fertile window opens before ovulation.
    pub fertile_lead_days: i64,
    /// Days the fertile window stays open after ovulation.
    pub fertile_trail_days: i64,
    pub thresholds: ConfidenceThresholds,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_history: 6,
            min_starts: 2,
            luteal_phase_days: 14,
            fertile_lead_days: 5,
            fertile_trail_days: 1,
            thresholds: ConfidenceThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationConfig {
    pub daily_target_ml: u32,
    /// Volume of one 8oz glass.
    pub ml_per_glass: u32,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            daily_target_ml: 2000,
            ml_per_glass: 237,
        }
    }
}

/// Top-level configuration for the MedSage core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedsageConfig {
    /// Bound on each context source call.
    pub source_timeout_ms: u64,
    /// Bound on a single generation call.
    pub generation_timeout_ms: u64,
    /// Bound on the conversation append.
    pub recording_timeout_ms: u64,
    pub lifestyle_window_days: u32,
    pub health_insight_window_days: u32,
    /// Reports used when the caller selects none.
    pub recent_report_limit: usize,
    /// Characters of extracted text taken from each report.
    pub report_excerpt_chars: usize,
    pub knowledge_snippet_limit: usize,
    pub conversation_history_limit: usize,
    pub cycle: CycleConfig,
    pub hydration: HydrationConfig,
    /// Replacement for the built-in prompt template.
    pub prompt_template: Option<String>,
}

impl Default for MedsageConfig {
    fn default() -> Self {
        Self {
            source_timeout_ms: 5_000,
            generation_timeout_ms: 60_000,
            recording_timeout_ms: 5_000,
            lifestyle_window_days: 7,
            health_insight_window_days: 30,
            recent_report_limit: 3,
            report_excerpt_chars: 1500,
            knowledge_snippet_limit: 6,
            conversation_history_limit: 10,
            cycle: CycleConfig::default(),
            hydration: HydrationConfig::default(),
            prompt_template: None,
        }
    }
}

impl MedsageConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    pub fn recording_timeout(&self) -> Duration {
        Duration::from_millis(self.recording_timeout_ms)
    }

    /// Create MedsageConfig from environment variables.
    ///
    /// Environment variables (unparsable values fall back to the default):
    /// - `MEDSAGE_SOURCE_TIMEOUT_MS` (default: 5000)
    /// - `MEDSAGE_GENERATION_TIMEOUT_MS` (default: 60000)
    /// - `MEDSAGE_RECORDING_TIMEOUT_MS` (default: 5000)
    /// - `MEDSAGE_LIFESTYLE_WINDOW_DAYS` (default: 7)
    /// - `MEDSAGE_HEALTH_INSIGHT_WINDOW_DAYS` (default: 30)
    /// - `MEDSAGE_RECENT_REPORT_LIMIT` (default: 3)
    /// - `MEDSAGE_REPORT_EXCERPT_CHARS` (default: 1500)
    /// - `MEDSAGE_KNOWLEDGE_SNIPPET_LIMIT` (default: 6)
    /// - `MEDSAGE_CONVERSATION_HISTORY_LIMIT` (default: 10)
    /// - `MEDSAGE_CYCLE_MAX_HISTORY` (default: 6)
    /// - `MEDSAGE_CYCLE_HIGH_BELOW` (default: 3.0)
    /// - `MEDSAGE_CYCLE_MEDIUM_BELOW` (default: 5.0)
    /// - `MEDSAGE_HYDRATION_TARGET_ML` (default: 2000)
    /// - `MEDSAGE_PROMPT_TEMPLATE` (default: built-in template)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`MedsageConfig::from_env`] but reading from an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<f64>().ok());
        let count = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        Self {
            source_timeout_ms: count("MEDSAGE_SOURCE_TIMEOUT_MS").unwrap_or(defaults.source_timeout_ms),
            generation_timeout_ms: count("MEDSAGE_GENERATION_TIMEOUT_MS")
                .unwrap_or(defaults.generation_timeout_ms),
            recording_timeout_ms: count("MEDSAGE_RECORDING_TIMEOUT_MS")
                .unwrap_or(defaults.recording_timeout_ms),
            lifestyle_window_days: count("MEDSAGE_LIFESTYLE_WINDOW_DAYS")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.lifestyle_window_days),
            health_insight_window_days: count("MEDSAGE_HEALTH_INSIGHT_WINDOW_DAYS")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.health_insight_window_days),
            recent_report_limit: count("MEDSAGE_RECENT_REPORT_LIMIT")
                .map(|v| v as usize)
                .unwrap_or(defaults.recent_report_limit),
            report_excerpt_chars: count("MEDSAGE_REPORT_EXCERPT_CHARS")
                .map(|v| v as usize)
                .unwrap_or(defaults.report_excerpt_chars),
            knowledge_snippet_limit: count("MEDSAGE_KNOWLEDGE_SNIPPET_LIMIT")
                .map(|v| v as usize)
                .unwrap_or(defaults.knowledge_snippet_limit),
            conversation_history_limit: count("MEDSAGE_CONVERSATION_HISTORY_LIMIT")
                .map(|v| v as usize)
                .unwrap_or(defaults.conversation_history_limit),
            cycle: CycleConfig {
                max_history: count("MEDSAGE_CYCLE_MAX_HISTORY")
                    .map(|v| v as usize)
                    .unwrap_or(defaults.cycle.max_history),
                thresholds: ConfidenceThresholds {
                    high_below: parsed("MEDSAGE_CYCLE_HIGH_BELOW")
                        .unwrap_or(defaults.cycle.thresholds.high_below),
                    medium_below: parsed("MEDSAGE_CYCLE_MEDIUM_BELOW")
                        .unwrap_or(defaults.cycle.thresholds.medium_below),
                },
                ..defaults.cycle
            },
            hydration: HydrationConfig {
                daily_target_ml: count("MEDSAGE_HYDRATION_TARGET_ML")
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(defaults.hydration.daily_target_ml),
                ..defaults.hydration
            },
            prompt_template: lookup("MEDSAGE_PROMPT_TEMPLATE").filter(|s| !s.trim().is_empty()),
        }
    }

    /// Parse a TOML document and validate the result.
    ///
    /// Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> MedsageResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> MedsageResult<()> {
        let positive = [
            ("source_timeout_ms", self.source_timeout_ms),
            ("generation_timeout_ms", self.generation_timeout_ms),
            ("recording_timeout_ms", self.recording_timeout_ms),
            ("lifestyle_window_days", u64::from(self.lifestyle_window_days)),
            ("health_insight_window_days", u64::from(self.health_insight_window_days)),
            ("recent_report_limit", self.recent_report_limit as u64),
            ("report_excerpt_chars", self.report_excerpt_chars as u64),
            ("knowledge_snippet_limit", self.knowledge_snippet_limit as u64),
            ("conversation_history_limit", self.conversation_history_limit as u64),
            ("hydration.daily_target_ml", u64::from(self.hydration.daily_target_ml)),
            ("hydration.ml_per_glass", u64::from(self.hydration.ml_per_glass)),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, value, format!("{} must be greater than 0", field)));
            }
        }

        let cycle = &self.cycle;
        if cycle.min_starts < 2 {
            return Err(invalid(
                "cycle.min_starts",
                cycle.min_starts,
                "at least two start dates are needed to form a gap",
            ));
        }
        if cycle.min_starts > cycle.max_history {
            return Err(invalid(
                "cycle.min_starts",
                cycle.min_starts,
                format!("must not exceed cycle.max_history ({})", cycle.max_history),
            ));
        }
        for (field, value) in [
            ("cycle.luteal_phase_days", cycle.luteal_phase_days),
            ("cycle.fertile_lead_days", cycle.fertile_lead_days),
            ("cycle.fertile_trail_days", cycle.fertile_trail_days),
        ] {
            if value < 0 {
                return Err(invalid(field, value, format!("{} must be non-negative", field)));
            }
        }

        let thresholds = &cycle.thresholds;
        if !(thresholds.high_below.is_finite() && thresholds.high_below > 0.0) {
            return Err(invalid(
                "cycle.thresholds.high_below",
                thresholds.high_below,
                "must be a positive number",
            ));
        }
        if !thresholds.medium_below.is_finite() || thresholds.high_below > thresholds.medium_below {
            return Err(invalid(
                "cycle.thresholds.medium_below",
                thresholds.medium_below,
                "must be finite and not below cycle.thresholds.high_below",
            ));
        }

        if let Some(template) = &self.prompt_template {
            if template.trim().is_empty() {
                return Err(invalid("prompt_template", "\"\"", "template must not be empty"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> crate::MedsageError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
    .into()
}

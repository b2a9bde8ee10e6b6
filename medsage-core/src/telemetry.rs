//! Tracing subscriber initialization

use crate::{ConfigError, MedsageResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "medsage=info,warn";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive, e.g. "medsage_context=debug,info"
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `MEDSAGE_LOG`: filter directive (default: "medsage=info,warn")
    /// - `MEDSAGE_LOG_FORMAT`: "json" or "pretty" (default: pretty)
    pub fn from_env() -> Self {
        let filter = std::env::var("MEDSAGE_LOG")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let format = std::env::var("MEDSAGE_LOG_FORMAT")
            .map(|s| parse_format(&s))
            .unwrap_or_default();
        Self { filter, format }
    }
}

fn parse_format(value: &str) -> LogFormat {
    if value.trim().eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. A second call returns a `ConfigError` instead of
/// replacing the installed subscriber.
pub fn init_tracing(config: &TelemetryConfig) -> MedsageResult<()> {
    let env_filter = EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::InvalidValue {
        field: "MEDSAGE_LOG".to_string(),
        value: config.filter.clone(),
        reason: e.to_string(),
    })?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match config.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
    };
    installed.map_err(|e| ConfigError::InvalidValue {
        field: "tracing".to_string(),
        value: format!("{:?}", config.format),
        reason: format!("Failed to init subscriber: {}", e),
    })?;

    tracing::info!(filter = %config.filter, format = ?config.format, "Telemetry initialized");
    Ok(())
}

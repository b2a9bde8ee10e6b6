//! MedSage Core - Entity Types
//!
//! Pure data structures, the error taxonomy, configuration and shared
//! infrastructure types for the MedSage health assistant. Behaviour lives in
//! the storage, stats, llm and context crates.

mod clock;
mod config;
mod entities;
mod enums;
mod error;
mod health;
mod identity;
pub mod telemetry;

pub use clock::*;
pub use config::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use health::*;
pub use identity::*;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};

/// Round to one decimal place, halves away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

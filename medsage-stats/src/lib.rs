//! MedSage Stats
//!
//! Small, exact statistics over a user's event history:
//! - [`AggregateRollup`]: windowed averages that ignore absent values
//! - [`CycleStatisticsEngine`]: cycle-length statistics and next-start projection
//! - [`HydrationSummary`]: daily water intake against a target
//! - [`InsightService`]: the same engines fed from an [`medsage_storage::EventStore`]

mod cycle;
mod hydration;
mod insights;
mod rollup;

pub use cycle::{classify, CyclePrediction, CycleStatisticsEngine};
pub use hydration::HydrationSummary;
pub use insights::InsightService;
pub use rollup::{
    AggregateRollup, RollupSummary, DAILY_HEALTH_FIELDS, DAILY_HEALTH_NO_DATA, LIFESTYLE_FIELDS,
    LIFESTYLE_NO_DATA,
};

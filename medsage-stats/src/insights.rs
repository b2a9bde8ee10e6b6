//! Store-backed entry points for the statistics engines.

use crate::rollup::window_start;
use crate::{AggregateRollup, CyclePrediction, CycleStatisticsEngine, HydrationSummary, RollupSummary};
use chrono::NaiveDate;
use medsage_core::{Clock, EventKind, EventPayload, MedsageConfig, MedsageResult, UserId};
use medsage_storage::EventStore;
use std::sync::Arc;
use tracing::debug;

/// Runs rollups and projections against a user's event log.
#[derive(Clone)]
pub struct InsightService {
    events: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    config: MedsageConfig,
    cycle: CycleStatisticsEngine,
}

impl InsightService {
    pub fn new(events: Arc<dyn EventStore>, clock: Arc<dyn Clock>, config: MedsageConfig) -> Self {
        let cycle = CycleStatisticsEngine::new(config.cycle.clone());
        Self {
            events,
            clock,
            config,
            cycle,
        }
    }

    async fn rollup(
        &self,
        user_id: &UserId,
        kind: EventKind,
        rollup: AggregateRollup,
        days: u32,
    ) -> MedsageResult<RollupSummary> {
        let today = self.clock.today();
        let since = window_start(today, days);
        let events = self.events.query(user_id, kind, Some(since)).await?;
        Ok(rollup.summarize(&events, days, today))
    }

    /// Lifestyle averages over the last `days` days.
    pub async fn lifestyle_summary(&self, user_id: &UserId, days: u32) -> MedsageResult<RollupSummary> {
        self.rollup(user_id, EventKind::Lifestyle, AggregateRollup::lifestyle(), days)
            .await
    }

    /// Daily health averages; `None` uses the configured window.
    pub async fn daily_health_insights(
        &self,
        user_id: &UserId,
        days: Option<u32>,
    ) -> MedsageResult<RollupSummary> {
        let days = days.unwrap_or(self.config.health_insight_window_days);
        self.rollup(user_id, EventKind::DailyHealth, AggregateRollup::daily_health(), days)
            .await
    }

    pub async fn daily_water_intake(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> MedsageResult<HydrationSummary> {
        let events = self.events.query(user_id, EventKind::Water, Some(date)).await?;
        Ok(HydrationSummary::from_entries(
            date,
            events,
            &self.config.hydration,
        ))
    }

    /// Project the next period from every logged start date.
    ///
    /// # Errors
    /// Propagates store failures, and `StatsError::InsufficientData` when
    /// fewer than two starts are logged.
    pub async fn predict_next_period(&self, user_id: &UserId) -> MedsageResult<CyclePrediction> {
        let events = self.events.query(user_id, EventKind::Period, None).await?;
        let mut starts: Vec<NaiveDate> = events
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::Period(p) => Some(p.start_date),
                _ => None,
            })
            .collect();
        starts.sort_unstable_by(|a, b| b.cmp(a));
        debug!(user_id = %user_id, starts = starts.len(), "Projecting next period");

        Ok(self.cycle.predict_dates(&starts)?)
    }
}

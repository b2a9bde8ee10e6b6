//! Component health reporting
//!
//! Used by generation backends, retrievers and the orchestrator's status
//! report so every collaborator describes its state the same way.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Health status for a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Reachable but not fully usable (e.g. model not pulled)
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Degraded => 1,
            Self::Unhealthy => 2,
        }
    }
}

/// Health of one named component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub component: String,
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl HealthCheck {
    fn with_status(status: HealthStatus, component: impl Into<String>, message: Option<String>) -> Self {
        Self {
            status,
            component: component.into(),
            message,
            response_time_ms: None,
            details: BTreeMap::new(),
        }
    }

    pub fn healthy(component: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Healthy, component, None)
    }

    pub fn degraded(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Degraded, component, Some(message.into()))
    }

    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Unhealthy, component, Some(message.into()))
    }

    /// Report for a collaborator that was never wired in.
    pub fn not_configured(component: impl Into<String>) -> Self {
        Self::unhealthy(component, "not configured")
    }

    pub fn with_response_time(mut self, ms: u64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Health of every collaborator behind the query pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub components: Vec<HealthCheck>,
}

impl SystemStatus {
    pub fn new(components: Vec<HealthCheck>) -> Self {
        Self { components }
    }

    /// The worst status among the components; `Healthy` when there are none.
    pub fn overall(&self) -> HealthStatus {
        self.components
            .iter()
            .map(|c| c.status)
            .max_by_key(|s| s.rank())
            .unwrap_or(HealthStatus::Healthy)
    }

    pub fn component(&self, name: &str) -> Option<&HealthCheck> {
        self.components.iter().find(|c| c.component == name)
    }
}

//! Per-source fault isolation.
//!
//! Every context source runs through [`isolate`]: the call is bounded by a
//! timeout, shielded from panics, and any failure is replaced by the
//! source's placeholder. The caller always gets a value.

use futures_util::FutureExt;
use medsage_core::{ContextError, MedsageResult};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::warn;

/// The four independent inputs of an aggregated context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextSource {
    Profile,
    Lifestyle,
    Reports,
    Knowledge,
}

impl ContextSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Lifestyle => "lifestyle",
            Self::Reports => "reports",
            Self::Knowledge => "knowledge",
        }
    }
}

impl fmt::Display for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of an isolated call: always a value, plus the reason it is a
/// placeholder when the call did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub struct Isolated<T> {
    pub value: T,
    pub degradation: Option<ContextError>,
}

impl<T> Isolated<T> {
    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }

    pub fn into_parts(self) -> (T, Option<ContextError>) {
        (self.value, self.degradation)
    }
}

/// Run one context source call in isolation.
///
/// An error, a panic, or running past `timeout` all yield `placeholder`
/// together with the matching [`ContextError`]. Nothing escapes.
pub async fn isolate<T, F>(source: ContextSource, timeout: Duration, call: F, placeholder: T) -> Isolated<T>
where
    F: Future<Output = MedsageResult<T>>,
{
    let outcome = tokio::time::timeout(timeout, AssertUnwindSafe(call).catch_unwind()).await;

    let error = match outcome {
        Ok(Ok(Ok(value))) => {
            return Isolated {
                value,
                degradation: None,
            }
        }
        Ok(Ok(Err(e))) => ContextError::SourceUnavailable {
            source_name: source.to_string(),
            reason: e.to_string(),
        },
        Ok(Err(_panic)) => ContextError::SourcePanicked {
            source_name: source.to_string(),
        },
        Err(_elapsed) => ContextError::SourceTimeout {
            source_name: source.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        },
    };

    warn!(source = %source, error = %error, "Context source degraded to placeholder");
    Isolated {
        value: placeholder,
        degradation: Some(error),
    }
}

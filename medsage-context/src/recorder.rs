//! Best-effort persistence of question/answer exchanges.

use futures_util::FutureExt;
use medsage_core::{Clock, ConversationRecord, EntityId, QueryResult, UserId};
use medsage_storage::ConversationStore;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Writes exchanges to a [`ConversationStore`] without ever failing the caller.
#[derive(Clone)]
pub struct ConversationRecorder {
    store: Arc<dyn ConversationStore>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl ConversationRecorder {
    pub fn new(store: Arc<dyn ConversationStore>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            store,
            clock,
            timeout,
        }
    }

    /// Persist one exchange.
    ///
    /// Returns the record id, or `None` when the store failed, panicked or
    /// timed out. Failures are logged and swallowed.
    pub async fn record(&self, user_id: &UserId, question: &str, result: &QueryResult) -> Option<EntityId> {
        let write = AssertUnwindSafe(async {
            let record =
                ConversationRecord::from_result(user_id.clone(), question, result, self.clock.now());
            self.store.append(record).await
        })
        .catch_unwind();

        match tokio::time::timeout(self.timeout, write).await {
            Ok(Ok(Ok(id))) => {
                debug!(user_id = %user_id, conversation_id = %id, "Conversation recorded");
                Some(id)
            }
            Ok(Ok(Err(e))) => {
                warn!(user_id = %user_id, error = %e, "Failed to record conversation");
                None
            }
            Ok(Err(_)) => {
                warn!(user_id = %user_id, "Conversation store panicked while recording");
                None
            }
            Err(_) => {
                warn!(
                    user_id = %user_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Recording conversation timed out"
                );
                None
            }
        }
    }

    /// The most recent exchanges for a user, newest first. Empty on failure.
    pub async fn history(&self, user_id: &UserId, limit: usize) -> Vec<ConversationRecord> {
        let read = AssertUnwindSafe(self.store.list_recent(user_id, limit)).catch_unwind();
        match tokio::time::timeout(self.timeout, read).await {
            Ok(Ok(Ok(records))) => records,
            Ok(Ok(Err(e))) => {
                warn!(user_id = %user_id, error = %e, "Failed to load conversation history");
                Vec::new()
            }
            Ok(Err(_)) => {
                warn!(user_id = %user_id, "Conversation store panicked while loading history");
                Vec::new()
            }
            Err(_) => {
                warn!(user_id = %user_id, "Loading conversation history timed out");
                Vec::new()
            }
        }
    }
}

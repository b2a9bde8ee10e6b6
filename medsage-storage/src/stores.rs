//! Async collaborator traits for the keyed stores.
//!
//! The core never owns persistence. Each store is handed to the components
//! that need it as an `Arc<dyn Trait>`, so a database-backed implementation
//! can replace [`crate::InMemoryStore`] without touching the pipeline.

use ::async_trait::async_trait;
use chrono::NaiveDate;
use medsage_core::{
    Appointment, AppointmentStatus, ConversationRecord, EntityId, Event, EventKind, Medication,
    MedsageResult, ProfileSnapshot, ReportDigest, ReportId, UserId,
};

/// Read access to user profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Get a user's profile, `None` when the user has none.
    async fn get(&self, user_id: &UserId) -> MedsageResult<Option<ProfileSnapshot>>;
}

/// The per-user event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events of one kind for a user, dated on or after `since` when given.
    ///
    /// # Returns
    /// Events in ascending date order; same-day events keep insertion order.
    async fn query(
        &self,
        user_id: &UserId,
        kind: EventKind,
        since: Option<NaiveDate>,
    ) -> MedsageResult<Vec<Event>>;

    /// Write a daily rollup event, replacing any entry for the same
    /// `(user, kind, date)`.
    ///
    /// # Errors
    /// Returns a validation error if the event kind is not a daily rollup kind.
    async fn upsert_daily(&self, event: Event) -> MedsageResult<EntityId>;

    /// Append an event-style entry.
    ///
    /// # Errors
    /// Returns a validation error if the event kind is a daily rollup kind.
    async fn append(&self, event: Event) -> MedsageResult<EntityId>;
}

/// Uploaded medical reports with their extracted text.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// The `limit` most recently uploaded reports for a user, newest first.
    async fn list_recent(&self, user_id: &UserId, limit: usize) -> MedsageResult<Vec<ReportDigest>>;

    /// A single report by id.
    async fn get(&self, report_id: ReportId) -> MedsageResult<Option<ReportDigest>>;
}

/// Persisted question/answer exchanges.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append(&self, record: ConversationRecord) -> MedsageResult<EntityId>;

    /// The `limit` most recent exchanges for a user, newest first.
    async fn list_recent(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> MedsageResult<Vec<ConversationRecord>>;
}

/// A user's prescribed medications.
#[async_trait]
pub trait MedicationStore: Send + Sync {
    async fn add(&self, medication: Medication) -> MedsageResult<EntityId>;

    /// Every medication for a user, active or not, ordered by start date.
    async fn list(&self, user_id: &UserId) -> MedsageResult<Vec<Medication>>;

    /// # Errors
    /// `StorageError::NotFound` when no medication has this id.
    async fn set_active(&self, medication_id: EntityId, active: bool) -> MedsageResult<()>;
}

/// Scheduled doctor visits.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn add(&self, appointment: Appointment) -> MedsageResult<EntityId>;

    /// Appointments dated within `from..=to`, in any status, ordered by date and time.
    async fn list_between(
        &self,
        user_id: &UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> MedsageResult<Vec<Appointment>>;

    /// # Errors
    /// `StorageError::NotFound` when no appointment has this id.
    async fn set_status(
        &self,
        appointment_id: EntityId,
        status: AppointmentStatus,
    ) -> MedsageResult<()>;
}

//! MedSage Test Utilities
//!
//! Shared test infrastructure for the MedSage workspace:
//! - Mock and misbehaving collaborators (stores, backends, retrievers)
//! - Proptest generators for entity types
//! - Fixtures for common scenarios
//! - Assertions for MedSage-specific results

// Re-export the reference store and the well-behaved mocks from their source crates
pub use medsage_llm::{MockGenerationBackend, MockKnowledgeRetriever};
pub use medsage_storage::InMemoryStore;

// Re-export core types for convenience
pub use medsage_core::{
    Clock, Confidence, ConversationRecord, EntityId, Event, EventKind, EventPayload, FixedClock,
    KnowledgeSnippet, LifestyleEntry, LlmError, MedsageConfig, MedsageError, MedsageResult,
    ProfileSnapshot, QueryResult, ReportDigest, ReportId, StatsError, StorageError, Timestamp,
    UserId, ValidationError,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use medsage_llm::{GenerationBackend, KnowledgeRetriever};
use medsage_storage::{ConversationStore, EventStore, ProfileStore, ReportStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// MOCK GENERATION BACKENDS
// ============================================================================

/// Returns the prompt it was given and keeps every prompt for inspection.
#[derive(Debug, Clone, Default)]
pub struct EchoGenerationBackend {
    prompts: Arc<Mutex<Vec<String>>>,
}

impl EchoGenerationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerationBackend for EchoGenerationBackend {
    async fn generate(&self, prompt: &str) -> MedsageResult<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(prompt.to_string())
    }

    fn model_id(&self) -> &str {
        "echo"
    }
}

/// Always fails with `LlmError::RequestFailed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingGenerationBackend;

#[async_trait]
impl GenerationBackend for FailingGenerationBackend {
    async fn generate(&self, _prompt: &str) -> MedsageResult<String> {
        Err(LlmError::RequestFailed {
            provider: "failing".to_string(),
            status: 503,
            message: "model not loaded".to_string(),
        }
        .into())
    }

    fn model_id(&self) -> &str {
        "failing"
    }
}

/// Panics on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingGenerationBackend;

#[async_trait]
impl GenerationBackend for PanickingGenerationBackend {
    async fn generate(&self, _prompt: &str) -> MedsageResult<String> {
        panic!("generation backend crashed")
    }

    fn model_id(&self) -> &str {
        "panicking"
    }
}

/// Returns whitespace only.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankGenerationBackend;

#[async_trait]
impl GenerationBackend for BlankGenerationBackend {
    async fn generate(&self, _prompt: &str) -> MedsageResult<String> {
        Ok("  \n ".to_string())
    }

    fn model_id(&self) -> &str {
        "blank"
    }
}

/// Always answers with the same text, byte for byte.
#[derive(Debug, Clone)]
pub struct CannedGenerationBackend {
    pub reply: String,
}

impl CannedGenerationBackend {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }
}

#[async_trait]
impl GenerationBackend for CannedGenerationBackend {
    async fn generate(&self, _prompt: &str) -> MedsageResult<String> {
        Ok(self.reply.clone())
    }

    fn model_id(&self) -> &str {
        "canned"
    }
}

/// Sleeps for `delay` before answering.
#[derive(Debug, Clone, Copy)]
pub struct SlowGenerationBackend {
    pub delay: Duration,
}

#[async_trait]
impl GenerationBackend for SlowGenerationBackend {
    async fn generate(&self, _prompt: &str) -> MedsageResult<String> {
        tokio::time::sleep(self.delay).await;
        Ok("too late".to_string())
    }

    fn model_id(&self) -> &str {
        "slow"
    }
}

// ============================================================================
// MOCK KNOWLEDGE RETRIEVERS
// ============================================================================

/// Always fails with a storage error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingKnowledgeRetriever;

#[async_trait]
impl KnowledgeRetriever for FailingKnowledgeRetriever {
    async fn search(&self, _question: &str, _k: usize) -> MedsageResult<Vec<KnowledgeSnippet>> {
        Err(unavailable("knowledge"))
    }
}

/// Panics on every search.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingKnowledgeRetriever;

#[async_trait]
impl KnowledgeRetriever for PanickingKnowledgeRetriever {
    async fn search(&self, _question: &str, _k: usize) -> MedsageResult<Vec<KnowledgeSnippet>> {
        panic!("vector index corrupted")
    }
}

/// Sleeps for `delay` before returning one snippet.
#[derive(Debug, Clone, Copy)]
pub struct SlowKnowledgeRetriever {
    pub delay: Duration,
}

#[async_trait]
impl KnowledgeRetriever for SlowKnowledgeRetriever {
    async fn search(&self, _question: &str, _k: usize) -> MedsageResult<Vec<KnowledgeSnippet>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![KnowledgeSnippet::new("late snippet")])
    }
}

// ============================================================================
// MISBEHAVING STORES
// ============================================================================

fn unavailable(store: &str) -> MedsageError {
    StorageError::Unavailable {
        store: store.to_string(),
        reason: "connection refused".to_string(),
    }
    .into()
}

/// Every operation fails with `StorageError::Unavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

#[async_trait]
impl ProfileStore for FailingStore {
    async fn get(&self, _user_id: &UserId) -> MedsageResult<Option<ProfileSnapshot>> {
        Err(unavailable("profiles"))
    }
}

#[async_trait]
impl EventStore for FailingStore {
    async fn query(
        &self,
        _user_id: &UserId,
        _kind: EventKind,
        _since: Option<NaiveDate>,
    ) -> MedsageResult<Vec<Event>> {
        Err(unavailable("events"))
    }

    async fn upsert_daily(&self, _event: Event) -> MedsageResult<EntityId> {
        Err(unavailable("events"))
    }

    async fn append(&self, _event: Event) -> MedsageResult<EntityId> {
        Err(unavailable("events"))
    }
}

#[async_trait]
impl ReportStore for FailingStore {
    async fn list_recent(&self, _user_id: &UserId, _limit: usize) -> MedsageResult<Vec<ReportDigest>> {
        Err(unavailable("reports"))
    }

    async fn get(&self, _report_id: ReportId) -> MedsageResult<Option<ReportDigest>> {
        Err(unavailable("reports"))
    }
}

#[async_trait]
impl ConversationStore for FailingStore {
    async fn append(&self, _record: ConversationRecord) -> MedsageResult<EntityId> {
        Err(unavailable("conversations"))
    }

    async fn list_recent(
        &self,
        _user_id: &UserId,
        _limit: usize,
    ) -> MedsageResult<Vec<ConversationRecord>> {
        Err(unavailable("conversations"))
    }
}

/// Profile and report reads panic; conversation writes panic.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingStore;

#[async_trait]
impl ProfileStore for PanickingStore {
    async fn get(&self, _user_id: &UserId) -> MedsageResult<Option<ProfileSnapshot>> {
        panic!("profile row decode failed")
    }
}

#[async_trait]
impl ReportStore for PanickingStore {
    async fn list_recent(&self, _user_id: &UserId, _limit: usize) -> MedsageResult<Vec<ReportDigest>> {
        panic!("report index out of bounds")
    }

    async fn get(&self, _report_id: ReportId) -> MedsageResult<Option<ReportDigest>> {
        panic!("report index out of bounds")
    }
}

#[async_trait]
impl ConversationStore for PanickingStore {
    async fn append(&self, _record: ConversationRecord) -> MedsageResult<EntityId> {
        panic!("conversation table locked")
    }

    async fn list_recent(
        &self,
        _user_id: &UserId,
        _limit: usize,
    ) -> MedsageResult<Vec<ConversationRecord>> {
        panic!("conversation table locked")
    }
}

/// Delegates to an [`InMemoryStore`] after sleeping for `delay`.
#[derive(Debug, Clone)]
pub struct SlowStore {
    pub inner: InMemoryStore,
    pub delay: Duration,
}

impl SlowStore {
    pub fn new(inner: InMemoryStore, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl ProfileStore for SlowStore {
    async fn get(&self, user_id: &UserId) -> MedsageResult<Option<ProfileSnapshot>> {
        tokio::time::sleep(self.delay).await;
        ProfileStore::get(&self.inner, user_id).await
    }
}

#[async_trait]
impl ReportStore for SlowStore {
    async fn list_recent(&self, user_id: &UserId, limit: usize) -> MedsageResult<Vec<ReportDigest>> {
        tokio::time::sleep(self.delay).await;
        ReportStore::list_recent(&self.inner, user_id, limit).await
    }

    async fn get(&self, report_id: ReportId) -> MedsageResult<Option<ReportDigest>> {
        tokio::time::sleep(self.delay).await;
        ReportStore::get(&self.inner, report_id).await
    }
}

#[async_trait]
impl ConversationStore for SlowStore {
    async fn append(&self, record: ConversationRecord) -> MedsageResult<EntityId> {
        tokio::time::sleep(self.delay).await;
        ConversationStore::append(&self.inner, record).await
    }

    async fn list_recent(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> MedsageResult<Vec<ConversationRecord>> {
        tokio::time::sleep(self.delay).await;
        ConversationStore::list_recent(&self.inner, user_id, limit).await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating test data.

    use super::*;
    use chrono::Duration as Days;
    use medsage_core::{MedicalHistory, PersonalInfo};
    use proptest::prelude::*;

    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        "[a-z][a-z0-9]{2,11}".prop_map(UserId::new)
    }

    /// Calendar dates from 2020 through 2025.
    fn arb_date() -> impl Strategy<Value = NaiveDate> {
        (0i64..2190).prop_map(|offset| fixtures::day("2020-01-01") + Days::days(offset))
    }

    fn one_decimal(range: std::ops::Range<f64>) -> impl Strategy<Value = f64> {
        range.prop_map(|v| (v * 10.0).round() / 10.0)
    }

    /// Lifestyle entries where any field may be absent.
    pub fn arb_lifestyle_entry() -> impl Strategy<Value = LifestyleEntry> {
        (
            prop::option::of(one_decimal(0.0..24.0)),
            prop::option::of(one_decimal(0.0..240.0)),
            prop::option::of(one_decimal(1.0..10.0)),
            prop::option::of(one_decimal(1.0..10.0)),
        )
            .prop_map(|(sleep_hours, exercise_minutes, mood, stress_level)| LifestyleEntry {
                sleep_hours,
                exercise_minutes,
                mood,
                stress_level,
            })
    }

    /// Lifestyle entries that pass journal validation.
    pub fn arb_complete_lifestyle_entry() -> impl Strategy<Value = LifestyleEntry> {
        (
            one_decimal(0.0..24.0),
            one_decimal(0.0..240.0),
            one_decimal(1.0..10.0),
            one_decimal(1.0..10.0),
        )
            .prop_map(|(sleep, exercise, mood, stress)| LifestyleEntry {
                sleep_hours: Some(sleep),
                exercise_minutes: Some(exercise),
                mood: Some(mood),
                stress_level: Some(stress),
            })
    }

    /// Period start dates, newest first, with gaps of 20 to 45 days.
    pub fn arb_start_history() -> impl Strategy<Value = Vec<NaiveDate>> {
        (arb_date(), prop::collection::vec(20i64..45, 0..8)).prop_map(|(latest, gaps)| {
            let mut starts = vec![latest];
            let mut current = latest;
            for gap in gaps {
                current -= Days::days(gap);
                starts.push(current);
            }
            starts
        })
    }

    pub fn arb_profile(user_id: UserId) -> impl Strategy<Value = ProfileSnapshot> {
        (
            prop::option::of(18u32..90),
            prop::option::of(prop_oneof![Just("female"), Just("male"), Just("other")]),
            prop::option::of(prop_oneof![Just("A+"), Just("O-"), Just("AB+")]),
            prop::collection::vec("[a-z]{4,10}", 0..3),
            prop::collection::vec("[a-z]{4,10}", 0..3),
        )
            .prop_map(move |(age, gender, blood_type, chronic_conditions, allergies)| {
                ProfileSnapshot {
                    user_id: user_id.clone(),
                    personal_info: PersonalInfo {
                        age,
                        gender: gender.map(str::to_string),
                        blood_type: blood_type.map(str::to_string),
                    },
                    medical_history: MedicalHistory {
                        chronic_conditions,
                        allergies,
                    },
                    ..Default::default()
                }
            })
    }

    /// Non-blank questions.
    pub fn arb_question() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ,']{0,60}\\?"
    }

    pub fn arb_valid_config() -> impl Strategy<Value = MedsageConfig> {
        (1u64..10_000, 1u32..60, 1usize..10, 100usize..3000, 1usize..12).prop_map(
            |(timeout_ms, window, reports, excerpt, snippets)| MedsageConfig {
                source_timeout_ms: timeout_ms,
                lifestyle_window_days: window,
                recent_report_limit: reports,
                report_excerpt_chars: excerpt,
                knowledge_snippet_limit: snippets,
                ..Default::default()
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built data for common test scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};
    use medsage_core::{new_entity_id, MedicalHistory, PersonalInfo};

    /// Parse a `YYYY-MM-DD` literal.
    #[track_caller]
    pub fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("fixture dates are valid")
    }

    /// A shared clock frozen at noon on `date`.
    pub fn fixed_clock(date: &str) -> Arc<dyn Clock> {
        Arc::new(FixedClock::on(day(date)))
    }

    /// Default config with short timeouts so failure paths finish quickly.
    pub fn fast_config() -> MedsageConfig {
        MedsageConfig {
            source_timeout_ms: 200,
            generation_timeout_ms: 500,
            recording_timeout_ms: 200,
            ..Default::default()
        }
    }

    pub fn profile(user_id: &UserId) -> ProfileSnapshot {
        ProfileSnapshot {
            user_id: user_id.clone(),
            personal_info: PersonalInfo {
                age: Some(34),
                gender: Some("female".to_string()),
                blood_type: Some("O+".to_string()),
            },
            medical_history: MedicalHistory {
                chronic_conditions: vec!["asthma".to_string()],
                allergies: vec!["penicillin".to_string()],
            },
            ..Default::default()
        }
    }

    /// A report uploaded at 09:00 UTC on `date`.
    pub fn report(user_id: &UserId, name: &str, text: &str, date: &str) -> ReportDigest {
        let uploaded = day(date).and_hms_opt(9, 0, 0).unwrap_or_default();
        ReportDigest {
            report_id: new_entity_id(),
            user_id: user_id.clone(),
            name: name.to_string(),
            report_type: "blood_test".to_string(),
            extracted_text: text.to_string(),
            uploaded_at: Utc.from_utc_datetime(&uploaded),
        }
    }

    pub fn lifestyle(sleep: f64, exercise: f64, mood: f64, stress: f64) -> LifestyleEntry {
        LifestyleEntry {
            sleep_hours: Some(sleep),
            exercise_minutes: Some(exercise),
            mood: Some(mood),
            stress_level: Some(stress),
        }
    }

    fn lifestyle_event(user_id: &UserId, date: &str, entry: LifestyleEntry) -> Event {
        Event::new(
            user_id.clone(),
            day(date),
            EventPayload::Lifestyle(entry),
            Utc.from_utc_datetime(&day(date).and_hms_opt(20, 0, 0).unwrap_or_default()),
        )
    }

    /// A store holding a profile, `report_count` reports and one week of lifestyle entries
    /// ending on 2024-03-10.
    pub async fn populated_store(user_id: &UserId, report_count: u32) -> MedsageResult<InMemoryStore> {
        let store = InMemoryStore::new();
        store.put_profile(profile(user_id))?;
        for i in 1..=report_count {
            let date = format!("2024-03-{:02}", i);
            store.put_report(report(user_id, &format!("Report {}", i), "Hemoglobin 13.5 g/dL", &date))?;
        }
        for (date, sleep) in [("2024-03-08", 7.0), ("2024-03-09", 8.0), ("2024-03-10", 6.0)] {
            store
                .upsert_daily(lifestyle_event(user_id, date, lifestyle(sleep, 30.0, 7.0, 4.0)))
                .await?;
        }
        Ok(store)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for MedSage-specific validation.

    use super::*;

    /// Assert that a MedsageResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &MedsageResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &MedsageResult<T>) {
        match result {
            Err(MedsageError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_insufficient_data<T: std::fmt::Debug>(result: &MedsageResult<T>) {
        match result {
            Err(MedsageError::Stats(StatsError::InsufficientData { .. })) => {}
            other => panic!("Expected InsufficientData, got: {:?}", other),
        }
    }

    /// Assert a query result has the given confidence and echoes its question.
    #[track_caller]
    pub fn assert_answer(result: &QueryResult, question: &str, confidence: Confidence) {
        assert_eq!(result.confidence, confidence, "answer was: {}", result.answer);
        assert_eq!(result.query, question);
        assert!(!result.answer.trim().is_empty(), "answer is blank");
    }

    /// Assert that the answer quotes the question, as fallback and error replies do.
    #[track_caller]
    pub fn assert_quotes_question(result: &QueryResult) {
        let quoted = format!("\"{}\"", result.query);
        assert!(
            result.answer.contains(&quoted),
            "answer does not quote {}: {}",
            quoted,
            result.answer
        );
    }
}

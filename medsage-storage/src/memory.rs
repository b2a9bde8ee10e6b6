//! In-memory store implementing every collaborator trait.
//!
//! Each collection sits behind its own `RwLock`; a write holds the lock for
//! the whole read-modify-write, which makes the daily upsert atomic per key.

use crate::{
    AppointmentStore, ConversationStore, EventStore, MedicationStore, ProfileStore, ReportStore,
};
use ::async_trait::async_trait;
use chrono::NaiveDate;
use medsage_core::{
    Appointment, AppointmentStatus, ConversationRecord, EntityId, Event, EventKind, Medication,
    MedsageResult, ProfileSnapshot, ReportDigest, ReportId, StorageError, UserId, ValidationError,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    profiles: Arc<RwLock<HashMap<UserId, ProfileSnapshot>>>,
    events: Arc<RwLock<Vec<Event>>>,
    reports: Arc<RwLock<HashMap<ReportId, ReportDigest>>>,
    conversations: Arc<RwLock<Vec<ConversationRecord>>>,
    medications: Arc<RwLock<Vec<Medication>>>,
    appointments: Arc<RwLock<Vec<Appointment>>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StorageError> {
    lock.read().map_err(|_| StorageError::LockPoisoned)
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StorageError> {
    lock.write().map_err(|_| StorageError::LockPoisoned)
}

fn not_found(entity: &str, id: EntityId) -> StorageError {
    StorageError::NotFound {
        entity: entity.to_string(),
        id: id.to_string(),
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile. Profiles are owned by the account
    /// collaborator; this exists to seed the store.
    pub fn put_profile(&self, profile: ProfileSnapshot) -> MedsageResult<()> {
        write(&self.profiles)?.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    pub fn put_report(&self, report: ReportDigest) -> MedsageResult<()> {
        write(&self.reports)?.insert(report.report_id, report);
        Ok(())
    }

    pub fn event_count(&self) -> MedsageResult<usize> {
        Ok(read(&self.events)?.len())
    }

    pub fn conversation_count(&self) -> MedsageResult<usize> {
        Ok(read(&self.conversations)?.len())
    }

    /// Clear all stored data.
    pub fn clear(&self) -> MedsageResult<()> {
        write(&self.profiles)?.clear();
        write(&self.events)?.clear();
        write(&self.reports)?.clear();
        write(&self.conversations)?.clear();
        write(&self.medications)?.clear();
        write(&self.appointments)?.clear();
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get(&self, user_id: &UserId) -> MedsageResult<Option<ProfileSnapshot>> {
        Ok(read(&self.profiles)?.get(user_id).cloned())
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn query(
        &self,
        user_id: &UserId,
        kind: EventKind,
        since: Option<NaiveDate>,
    ) -> MedsageResult<Vec<Event>> {
        let events = read(&self.events)?;
        let mut matching: Vec<Event> = events
            .iter()
            .filter(|e| &e.user_id == user_id && e.kind() == kind)
            .filter(|e| since.map_or(true, |cutoff| e.date >= cutoff))
            .cloned()
            .collect();
        // Stable sort keeps insertion order within a day.
        matching.sort_by_key(|e| e.date);
        Ok(matching)
    }

    async fn upsert_daily(&self, event: Event) -> MedsageResult<EntityId> {
        let kind = event.kind();
        if !kind.is_daily_rollup() {
            return Err(ValidationError::InvalidValue {
                field: "kind".to_string(),
                reason: format!("{} is append-only", kind),
            }
            .into());
        }

        let id = event.event_id;
        let mut events = write(&self.events)?;
        match events
            .iter_mut()
            .find(|e| e.user_id == event.user_id && e.kind() == kind && e.date == event.date)
        {
            Some(existing) => *existing = event,
            None => events.push(event),
        }
        Ok(id)
    }

    async fn append(&self, event: Event) -> MedsageResult<EntityId> {
        let kind = event.kind();
        if kind.is_daily_rollup() {
            return Err(ValidationError::InvalidValue {
                field: "kind".to_string(),
                reason: format!("{} is keyed by date, use upsert_daily", kind),
            }
            .into());
        }

        let id = event.event_id;
        write(&self.events)?.push(event);
        Ok(id)
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn list_recent(&self, user_id: &UserId, limit: usize) -> MedsageResult<Vec<ReportDigest>> {
        let reports = read(&self.reports)?;
        let mut owned: Vec<ReportDigest> = reports
            .values()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| b.report_id.cmp(&a.report_id))
        });
        owned.truncate(limit);
        Ok(owned)
    }

    async fn get(&self, report_id: ReportId) -> MedsageResult<Option<ReportDigest>> {
        Ok(read(&self.reports)?.get(&report_id).cloned())
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn append(&self, record: ConversationRecord) -> MedsageResult<EntityId> {
        let id = record.conversation_id;
        let mut conversations = write(&self.conversations)?;
        if conversations.iter().any(|c| c.conversation_id == id) {
            return Err(StorageError::InsertFailed {
                entity: "conversation".to_string(),
                reason: "already exists".to_string(),
            }
            .into());
        }
        conversations.push(record);
        Ok(id)
    }

    async fn list_recent(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> MedsageResult<Vec<ConversationRecord>> {
        let conversations = read(&self.conversations)?;
        // Newest first; ties fall back to reverse insertion order.
        let mut mine: Vec<ConversationRecord> = conversations
            .iter()
            .rev()
            .filter(|c| &c.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        mine.truncate(limit);
        Ok(mine)
    }
}

#[async_trait]
impl MedicationStore for InMemoryStore {
    async fn add(&self, medication: Medication) -> MedsageResult<EntityId> {
        let id = medication.medication_id;
        write(&self.medications)?.push(medication);
        Ok(id)
    }

    async fn list(&self, user_id: &UserId) -> MedsageResult<Vec<Medication>> {
        let mut mine: Vec<Medication> = read(&self.medications)?
            .iter()
            .filter(|m| &m.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by_key(|m| m.start_date);
        Ok(mine)
    }

    async fn set_active(&self, medication_id: EntityId, active: bool) -> MedsageResult<()> {
        let mut medications = write(&self.medications)?;
        let medication = medications
            .iter_mut()
            .find(|m| m.medication_id == medication_id)
            .ok_or_else(|| not_found("medication", medication_id))?;
        medication.active = active;
        Ok(())
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn add(&self, appointment: Appointment) -> MedsageResult<EntityId> {
        let id = appointment.appointment_id;
        write(&self.appointments)?.push(appointment);
        Ok(id)
    }

    async fn list_between(
        &self,
        user_id: &UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> MedsageResult<Vec<Appointment>> {
        let mut matching: Vec<Appointment> = read(&self.appointments)?
            .iter()
            .filter(|a| &a.user_id == user_id && (from..=to).contains(&a.date))
            .cloned()
            .collect();
        matching.sort_by_key(|a| (a.date, a.time));
        Ok(matching)
    }

    async fn set_status(
        &self,
        appointment_id: EntityId,
        status: AppointmentStatus,
    ) -> MedsageResult<()> {
        let mut appointments = write(&self.appointments)?;
        let appointment = appointments
            .iter_mut()
            .find(|a| a.appointment_id == appointment_id)
            .ok_or_else(|| not_found("appointment", appointment_id))?;
        appointment.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use medsage_core::{
        new_entity_id, Confidence, DailyHealthEntry, EventPayload, LifestyleEntry, MedsageError,
        QueryResult, WaterEntry,
    };

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn lifestyle(user: &str, date: &str, sleep: f64) -> Event {
        Event::new(
            UserId::from(user),
            day(date),
            EventPayload::Lifestyle(LifestyleEntry {
                sleep_hours: Some(sleep),
                ..Default::default()
            }),
            Utc::now(),
        )
    }

    fn water(user: &str, date: &str, ml: u32) -> Event {
        Event::new(
            UserId::from(user),
            day(date),
            EventPayload::Water(WaterEntry { amount_ml: ml }),
            Utc::now(),
        )
    }

    fn report(user: &str, name: &str, minutes_ago: i64) -> ReportDigest {
        ReportDigest {
            report_id: new_entity_id(),
            user_id: UserId::from(user),
            name: name.to_string(),
            report_type: "lab".to_string(),
            extracted_text: format!("{} text", name),
            uploaded_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_day_entry() {
        let store = InMemoryStore::new();
        let user = UserId::from("u1");

        store.upsert_daily(lifestyle("u1", "2024-03-01", 6.0)).await.unwrap();
        store.upsert_daily(lifestyle("u1", "2024-03-01", 8.0)).await.unwrap();

        let events = store.query(&user, EventKind::Lifestyle, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].numeric("sleep_hours"), Some(8.0));
    }

    #[tokio::test]
    async fn test_upsert_keys_by_kind_and_user() {
        let store = InMemoryStore::new();
        store.upsert_daily(lifestyle("u1", "2024-03-01", 6.0)).await.unwrap();
        store.upsert_daily(lifestyle("u2", "2024-03-01", 7.0)).await.unwrap();
        store
            .upsert_daily(Event::new(
                UserId::from("u1"),
                day("2024-03-01"),
                EventPayload::DailyHealth(DailyHealthEntry::default()),
                Utc::now(),
            ))
            .await
            .unwrap();

        assert_eq!(store.event_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_upsert_rejects_append_only_kind() {
        let store = InMemoryStore::new();
        let err = store.upsert_daily(water("u1", "2024-03-01", 250)).await.unwrap_err();
        assert!(matches!(err, MedsageError::Validation(_)));

        let err = EventStore::append(&store, lifestyle("u1", "2024-03-01", 7.0))
            .await
            .unwrap_err();
        assert!(matches!(err, MedsageError::Validation(_)));
    }

    #[tokio::test]
    async fn test_append_keeps_every_entry() {
        let store = InMemoryStore::new();
        let user = UserId::from("u1");
        EventStore::append(&store, water("u1", "2024-03-01", 250)).await.unwrap();
        EventStore::append(&store, water("u1", "2024-03-01", 300)).await.unwrap();

        let events = store.query(&user, EventKind::Water, None).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].numeric("amount_ml"), Some(250.0));
        assert_eq!(events[1].numeric("amount_ml"), Some(300.0));
    }

    #[tokio::test]
    async fn test_query_filters_since_and_sorts_ascending() {
        let store = InMemoryStore::new();
        let user = UserId::from("u1");
        for (date, sleep) in [("2024-03-05", 5.0), ("2024-02-20", 9.0), ("2024-03-02", 7.0)] {
            store.upsert_daily(lifestyle("u1", date, sleep)).await.unwrap();
        }

        let events = store
            .query(&user, EventKind::Lifestyle, Some(day("2024-03-01")))
            .await
            .unwrap();
        let dates: Vec<NaiveDate> = events.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![day("2024-03-02"), day("2024-03-05")]);
    }

    #[tokio::test]
    async fn test_reports_newest_first_with_limit() {
        let store = InMemoryStore::new();
        let user = UserId::from("u1");
        store.put_report(report("u1", "old", 60)).unwrap();
        store.put_report(report("u1", "newest", 1)).unwrap();
        store.put_report(report("u1", "middle", 30)).unwrap();
        store.put_report(report("u2", "other", 0)).unwrap();

        let recent = ReportStore::list_recent(&store, &user, 2).await.unwrap();
        let names: Vec<&str> = recent.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["newest", "middle"]);
    }

    #[tokio::test]
    async fn test_report_get_missing() {
        let store = InMemoryStore::new();
        assert!(ReportStore::get(&store, new_entity_id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conversations_newest_first() {
        let store = InMemoryStore::new();
        let user = UserId::from("u1");
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        for i in 0..3 {
            let result = QueryResult {
                query: format!("q{}", i),
                answer: "a".to_string(),
                confidence: Confidence::High,
                timestamp: base,
                reports_used: 0,
            };
            let at = base + Duration::minutes(i);
            let record = ConversationRecord::from_result(user.clone(), &result.query, &result, at);
            ConversationStore::append(&store, record).await.unwrap();
        }

        let recent = ConversationStore::list_recent(&store, &user, 2).await.unwrap();
        let questions: Vec<&str> = recent.iter().map(|c| c.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q1"]);
        assert_eq!(store.conversation_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_profile_roundtrip_and_clear() {
        let store = InMemoryStore::new();
        let user = UserId::from("u1");
        store
            .put_profile(ProfileSnapshot {
                user_id: user.clone(),
                ..Default::default()
            })
            .unwrap();
        assert!(ProfileStore::get(&store, &user).await.unwrap().is_some());

        store.clear().unwrap();
        assert!(ProfileStore::get(&store, &user).await.unwrap().is_none());
    }
}

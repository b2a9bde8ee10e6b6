//! Context assembly from the four independent sources.

use crate::isolate::{isolate, ContextSource};
use medsage_core::{
    ContextError, MedsageConfig, MedsageResult, ProfileSnapshot, ReportDigest, ReportId, UserId,
};
use medsage_llm::BackendRegistry;
use medsage_stats::{InsightService, RollupSummary};
use medsage_storage::{ProfileStore, ReportStore};
use std::sync::Arc;
use tracing::debug;

pub const NO_PATIENT_CONTEXT: &str = "No patient context available";
pub const NO_REPORTS: &str = "No medical reports available";
const NO_EXTRACTED_TEXT: &str = "[No text extracted]";

/// The four context blocks for one question. Built fresh per query.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedContext {
    /// Formatted profile lines, `None` when the user has no profile or the
    /// profile source failed.
    pub profile: Option<String>,
    /// Lifestyle averages block, `None` when the window holds no entries.
    pub lifestyle: Option<String>,
    pub reports: String,
    /// Concatenated knowledge snippets; empty when retrieval is unavailable.
    pub knowledge: String,
    /// Number of reports included in `reports`.
    pub reports_used: usize,
    /// One entry per source that fell back to its placeholder.
    pub degraded: Vec<ContextError>,
}

impl AggregatedContext {
    /// Profile and lifestyle combined into the patient block of the prompt.
    pub fn patient_context(&self) -> String {
        let parts: Vec<&str> = [self.profile.as_deref(), self.lifestyle.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            NO_PATIENT_CONTEXT.to_string()
        } else {
            parts.join("\n\n")
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Builds an [`AggregatedContext`]. Never fails: each source is isolated and
/// degrades to its placeholder on error, panic or timeout.
#[derive(Clone)]
pub struct ContextAggregator {
    profiles: Arc<dyn ProfileStore>,
    insights: InsightService,
    reports: Arc<dyn ReportStore>,
    registry: BackendRegistry,
    config: MedsageConfig,
}

impl ContextAggregator {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        insights: InsightService,
        reports: Arc<dyn ReportStore>,
        registry: BackendRegistry,
        config: MedsageConfig,
    ) -> Self {
        Self {
            profiles,
            insights,
            reports,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &MedsageConfig {
        &self.config
    }

    /// Gather all four blocks for `question`.
    ///
    /// `report_ids` selects reports explicitly; `None` or an empty slice uses
    /// the most recent uploads. The sources run concurrently.
    pub async fn build(
        &self,
        user_id: &UserId,
        question: &str,
        report_ids: Option<&[ReportId]>,
    ) -> AggregatedContext {
        let limit = self.config.source_timeout();
        debug!(user_id = %user_id, "Building context");

        let (profile, lifestyle, reports, knowledge) = tokio::join!(
            isolate(ContextSource::Profile, limit, self.profile_block(user_id), None),
            isolate(ContextSource::Lifestyle, limit, self.lifestyle_block(user_id), None),
            isolate(
                ContextSource::Reports,
                limit,
                self.report_block(user_id, report_ids),
                (NO_REPORTS.to_string(), 0),
            ),
            isolate(ContextSource::Knowledge, limit, self.knowledge_block(question), String::new()),
        );

        let (profile, profile_err) = profile.into_parts();
        let (lifestyle, lifestyle_err) = lifestyle.into_parts();
        let ((reports, reports_used), reports_err) = reports.into_parts();
        let (knowledge, knowledge_err) = knowledge.into_parts();
        let degraded: Vec<ContextError> = [profile_err, lifestyle_err, reports_err, knowledge_err]
            .into_iter()
            .flatten()
            .collect();

        debug!(
            user_id = %user_id,
            reports_used,
            degraded = degraded.len(),
            "Context built"
        );
        AggregatedContext {
            profile,
            lifestyle,
            reports,
            knowledge,
            reports_used,
            degraded,
        }
    }

    async fn profile_block(&self, user_id: &UserId) -> MedsageResult<Option<String>> {
        Ok(self.profiles.get(user_id).await?.map(|p| format_profile(&p)))
    }

    async fn lifestyle_block(&self, user_id: &UserId) -> MedsageResult<Option<String>> {
        let summary = self
            .insights
            .lifestyle_summary(user_id, self.config.lifestyle_window_days)
            .await?;
        Ok(format_lifestyle(&summary))
    }

    async fn report_block(
        &self,
        user_id: &UserId,
        report_ids: Option<&[ReportId]>,
    ) -> MedsageResult<(String, usize)> {
        let reports = match report_ids {
            Some(ids) if !ids.is_empty() => {
                let mut found = Vec::with_capacity(ids.len());
                for id in ids {
                    match self.reports.get(*id).await? {
                        Some(report) if &report.user_id == user_id => found.push(report),
                        Some(_) => debug!(report_id = %id, "Skipping report owned by another user"),
                        None => debug!(report_id = %id, "Skipping unknown report"),
                    }
                }
                found
            }
            _ => {
                self.reports
                    .list_recent(user_id, self.config.recent_report_limit)
                    .await?
            }
        };

        if reports.is_empty() {
            return Ok((NO_REPORTS.to_string(), 0));
        }
        Ok((
            format_reports(&reports, self.config.report_excerpt_chars),
            reports.len(),
        ))
    }

    async fn knowledge_block(&self, question: &str) -> MedsageResult<String> {
        // Retrieval is optional.
        let Ok(retriever) = self.registry.knowledge() else {
            return Ok(String::new());
        };
        let k = self.config.knowledge_snippet_limit;
        let snippets = retriever.search(question, k).await?;
        Ok(snippets
            .iter()
            .take(k)
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

/// Personal info and medical history lines.
pub fn format_profile(profile: &ProfileSnapshot) -> String {
    let info = &profile.personal_info;
    let history = &profile.medical_history;

    let mut lines = vec![
        format!(
            "Age: {}",
            info.age.map_or_else(|| "Unknown".to_string(), |a| a.to_string())
        ),
        format!("Gender: {}", info.gender.as_deref().unwrap_or("Unknown")),
    ];
    if let Some(blood_type) = info.blood_type.as_deref().filter(|b| !b.is_empty()) {
        lines.push(format!("Blood Type: {}", blood_type));
    }
    if !history.chronic_conditions.is_empty() {
        lines.push(format!(
            "\nChronic Conditions: {}",
            history.chronic_conditions.join(", ")
        ));
    }
    if !history.allergies.is_empty() {
        lines.push(format!("Allergies: {}", history.allergies.join(", ")));
    }
    lines.join("\n")
}

/// Lifestyle bullet lines for the non-null averages, `None` for an empty window.
pub fn format_lifestyle(summary: &RollupSummary) -> Option<String> {
    if !summary.has_data() {
        return None;
    }
    let mut lines = vec![format!("Recent Lifestyle ({} days):", summary.period_days)];
    let bullets = [
        ("sleep_hours", "Avg Sleep", " hours"),
        ("exercise_minutes", "Avg Exercise", " minutes"),
        ("mood", "Avg Mood", "/10"),
        ("stress_level", "Avg Stress Level", "/10"),
    ];
    for (field, label, unit) in bullets {
        if let Some(value) = summary.average(field) {
            lines.push(format!("- {}: {:.1}{}", label, value, unit));
        }
    }
    Some(lines.join("\n"))
}

/// Numbered report sections, each cut to `excerpt_chars` characters.
pub fn format_reports(reports: &[ReportDigest], excerpt_chars: usize) -> String {
    let mut lines = Vec::with_capacity(reports.len() * 2);
    for (i, report) in reports.iter().enumerate() {
        lines.push(format!(
            "--- Report {}: {} ({}) ---",
            i + 1,
            report.name,
            report.report_type
        ));
        let excerpt = truncate_chars(&report.extracted_text, excerpt_chars);
        lines.push(if excerpt.is_empty() {
            NO_EXTRACTED_TEXT.to_string()
        } else {
            excerpt.to_string()
        });
    }
    lines.join("\n")
}

/// The first `max` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use medsage_core::{
        new_entity_id, Clock, FixedClock, LifestyleEntry, MedicalHistory, PersonalInfo,
    };
    use medsage_llm::MockKnowledgeRetriever;
    use medsage_storage::{HealthJournal, InMemoryStore};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn profile(user: &UserId) -> ProfileSnapshot {
        ProfileSnapshot {
            user_id: user.clone(),
            personal_info: PersonalInfo {
                age: Some(34),
                gender: Some("female".into()),
                blood_type: Some("O+".into()),
            },
            medical_history: MedicalHistory {
                chronic_conditions: vec!["asthma".into(), "anemia".into()],
                allergies: vec!["penicillin".into()],
            },
            ..Default::default()
        }
    }

    fn report(user: &UserId, name: &str, text: &str, day: u32) -> ReportDigest {
        ReportDigest {
            report_id: new_entity_id(),
            user_id: user.clone(),
            name: name.into(),
            report_type: "blood_test".into(),
            extracted_text: text.into(),
            uploaded_at: Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap(),
        }
    }

    fn aggregator(store: Arc<InMemoryStore>, registry: BackendRegistry) -> ContextAggregator {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(today()));
        let config = MedsageConfig::default();
        let insights = InsightService::new(store.clone(), clock, config.clone());
        ContextAggregator::new(store.clone(), insights, store, registry, config)
    }

    #[test]
    fn test_format_profile() {
        let user = UserId::from("u1");
        assert_eq!(
            format_profile(&profile(&user)),
            "Age: 34\nGender: female\nBlood Type: O+\n\nChronic Conditions: asthma, anemia\nAllergies: penicillin"
        );

        let bare = ProfileSnapshot {
            user_id: user,
            ..Default::default()
        };
        assert_eq!(format_profile(&bare), "Age: Unknown\nGender: Unknown");
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_format_reports_cuts_and_marks_empty() {
        let user = UserId::from("u1");
        let long = "x".repeat(2000);
        let block = format_reports(&[report(&user, "CBC", &long, 1), report(&user, "Scan", "", 2)], 1500);
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines[0], "--- Report 1: CBC (blood_test) ---");
        assert_eq!(lines[1].len(), 1500);
        assert_eq!(lines[2], "--- Report 2: Scan (blood_test) ---");
        assert_eq!(lines[3], "[No text extracted]");
    }

    #[tokio::test]
    async fn test_build_with_all_sources() {
        let store = Arc::new(InMemoryStore::new());
        let user = UserId::from("u1");
        store.put_profile(profile(&user)).unwrap();
        for day in 1..=4 {
            store.put_report(report(&user, &format!("R{}", day), "text", day)).unwrap();
        }
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(today()));
        HealthJournal::new(store.clone(), clock)
            .log_daily_lifestyle(
                &user,
                today(),
                LifestyleEntry {
                    sleep_hours: Some(7.5),
                    exercise_minutes: Some(30.0),
                    mood: Some(8.0),
                    stress_level: Some(4.0),
                },
            )
            .await
            .unwrap();
        let registry = BackendRegistry::new()
            .with_knowledge(Arc::new(MockKnowledgeRetriever::new(["a", "b"])));

        let ctx = aggregator(store, registry).build(&user, "q", None).await;
        assert!(!ctx.is_degraded());
        assert_eq!(ctx.reports_used, 3);
        assert!(ctx.reports.starts_with("--- Report 1: R4 (blood_test) ---"));
        assert_eq!(ctx.knowledge, "a\n\nb");
        assert_eq!(
            ctx.lifestyle.as_deref(),
            Some("Recent Lifestyle (7 days):\n- Avg Sleep: 7.5 hours\n- Avg Exercise: 30.0 minutes\n- Avg Mood: 8.0/10\n- Avg Stress Level: 4.0/10")
        );
        assert!(ctx.patient_context().starts_with("Age: 34"));
        assert!(ctx.patient_context().ends_with("- Avg Stress Level: 4.0/10"));
    }

    #[tokio::test]
    async fn test_build_for_unknown_user_uses_placeholders() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = aggregator(store, BackendRegistry::new())
            .build(&UserId::from("nobody"), "q", None)
            .await;
        assert!(!ctx.is_degraded());
        assert_eq!(ctx.patient_context(), NO_PATIENT_CONTEXT);
        assert_eq!(ctx.lifestyle, None);
        assert_eq!(ctx.reports, NO_REPORTS);
        assert_eq!(ctx.reports_used, 0);
        assert_eq!(ctx.knowledge, "");
    }

    #[tokio::test]
    async fn test_explicit_report_ids_skip_missing_and_foreign() {
        let store = Arc::new(InMemoryStore::new());
        let user = UserId::from("u1");
        let mine = report(&user, "Mine", "ok", 1);
        let theirs = report(&UserId::from("u2"), "Theirs", "secret", 2);
        let ids = [theirs.report_id, new_entity_id(), mine.report_id];
        store.put_report(mine).unwrap();
        store.put_report(theirs).unwrap();

        let ctx = aggregator(store, BackendRegistry::new())
            .build(&user, "q", Some(&ids[..]))
            .await;
        assert_eq!(ctx.reports_used, 1);
        assert_eq!(ctx.reports, "--- Report 1: Mine (blood_test) ---\nok");
    }

    #[tokio::test]
    async fn test_empty_id_list_means_recent() {
        let store = Arc::new(InMemoryStore::new());
        let user = UserId::from("u1");
        store.put_report(report(&user, "Only", "t", 1)).unwrap();
        let ctx = aggregator(store, BackendRegistry::new())
            .build(&user, "q", Some(&[][..]))
            .await;
        assert_eq!(ctx.reports_used, 1);
    }
}

//! End-to-end behaviour of the question answering pipeline with
//! well-behaved and misbehaving collaborators.

use medsage_context::{
    Collaborators, ContextAggregator, QueryOrchestrator, DEFAULT_TEMPLATE, NO_PATIENT_CONTEXT,
    NO_REPORTS,
};
use medsage_core::{ContextError, HealthStatus};
use medsage_llm::{BackendRegistry, GenerationBackend, KnowledgeRetriever};
use medsage_stats::InsightService;
use medsage_storage::{ConversationStore, EventStore, ProfileStore, ReportStore};
use medsage_test_utils::assertions::{assert_answer, assert_quotes_question};
use medsage_test_utils::fixtures::{self, fast_config, fixed_clock, populated_store};
use medsage_test_utils::*;
use std::sync::Arc;
use std::time::Duration;

const TODAY: &str = "2024-03-10";
const QUESTION: &str = "Why do I feel tired in the afternoon?";

struct Stores {
    profiles: Arc<dyn ProfileStore>,
    events: Arc<dyn EventStore>,
    reports: Arc<dyn ReportStore>,
    conversations: Arc<dyn ConversationStore>,
}

impl Stores {
    fn all(store: InMemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            profiles: store.clone(),
            events: store.clone(),
            reports: store.clone(),
            conversations: store,
        }
    }

    fn collaborators(self, registry: BackendRegistry) -> Collaborators {
        Collaborators {
            profiles: self.profiles,
            events: self.events,
            reports: self.reports,
            conversations: self.conversations,
            registry,
            clock: fixed_clock(TODAY),
        }
    }
}

fn user() -> UserId {
    UserId::from("patient-1")
}

async fn orchestrator(registry: BackendRegistry) -> QueryOrchestrator {
    let store = populated_store(&user(), 4).await.unwrap();
    QueryOrchestrator::assemble(Stores::all(store).collaborators(registry), fast_config()).unwrap()
}

fn aggregator(stores: Stores, registry: BackendRegistry) -> ContextAggregator {
    let config = fast_config();
    let insights = InsightService::new(stores.events, fixed_clock(TODAY), config.clone());
    ContextAggregator::new(stores.profiles, insights, stores.reports, registry, config)
}

fn with_generation(backend: impl GenerationBackend + 'static) -> BackendRegistry {
    BackendRegistry::new().with_generation(Arc::new(backend))
}

fn with_knowledge(retriever: impl KnowledgeRetriever + 'static) -> BackendRegistry {
    BackendRegistry::new().with_knowledge(Arc::new(retriever))
}

// ============================================================================
// CONTEXT AGGREGATION
// ============================================================================

#[tokio::test]
async fn failing_retriever_leaves_other_blocks_intact() {
    let store = populated_store(&user(), 4).await.unwrap();
    let ctx = aggregator(Stores::all(store), with_knowledge(FailingKnowledgeRetriever))
        .build(&user(), QUESTION, None)
        .await;

    assert_eq!(ctx.knowledge, "");
    assert!(ctx.profile.as_deref().unwrap().starts_with("Age: 34\nGender: female"));
    assert_eq!(ctx.reports_used, 3);
    assert!(ctx.reports.starts_with("--- Report 1: Report 4 (blood_test) ---"));
    assert_eq!(ctx.degraded.len(), 1);
    assert!(matches!(
        &ctx.degraded[0],
        ContextError::SourceUnavailable { source_name, .. } if source_name == "knowledge"
    ));
}

#[tokio::test]
async fn panicking_retriever_is_contained() {
    let store = populated_store(&user(), 1).await.unwrap();
    let ctx = aggregator(Stores::all(store), with_knowledge(PanickingKnowledgeRetriever))
        .build(&user(), QUESTION, None)
        .await;

    assert_eq!(ctx.knowledge, "");
    assert_eq!(ctx.reports_used, 1);
    assert_eq!(
        ctx.degraded,
        vec![ContextError::SourcePanicked {
            source_name: "knowledge".into()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn slow_sources_time_out_independently() {
    let inner = populated_store(&user(), 2).await.unwrap();
    let slow = Arc::new(SlowStore::new(inner.clone(), Duration::from_secs(30)));
    let stores = Stores {
        profiles: slow.clone(),
        events: Arc::new(inner.clone()),
        reports: Arc::new(inner),
        conversations: slow,
    };
    let registry = with_knowledge(SlowKnowledgeRetriever {
        delay: Duration::from_secs(30),
    });

    let ctx = aggregator(stores, registry).build(&user(), QUESTION, None).await;
    assert_eq!(ctx.profile, None);
    assert_eq!(ctx.knowledge, "");
    assert_eq!(ctx.reports_used, 2);
    assert!(ctx.lifestyle.is_some());
    assert_eq!(ctx.degraded.len(), 2);
    assert!(ctx
        .degraded
        .iter()
        .all(|e| matches!(e, ContextError::SourceTimeout { timeout_ms: 200, .. })));
    // Lifestyle alone still forms the patient block.
    assert!(ctx.patient_context().starts_with("Recent Lifestyle (7 days):"));
}

#[tokio::test]
async fn failing_stores_degrade_to_placeholders() {
    let failing = Arc::new(FailingStore);
    let stores = Stores {
        profiles: failing.clone(),
        events: failing.clone(),
        reports: failing.clone(),
        conversations: failing,
    };
    let ctx = aggregator(stores, with_knowledge(MockKnowledgeRetriever::new(["Rest helps."])))
        .build(&user(), QUESTION, None)
        .await;

    assert_eq!(ctx.patient_context(), NO_PATIENT_CONTEXT);
    assert_eq!(ctx.lifestyle, None);
    assert_eq!(ctx.reports, NO_REPORTS);
    assert_eq!(ctx.reports_used, 0);
    assert_eq!(ctx.knowledge, "Rest helps.");
    assert_eq!(ctx.degraded.len(), 3);
}

#[tokio::test]
async fn panicking_stores_degrade_to_placeholders() {
    let inner = InMemoryStore::new();
    let stores = Stores {
        profiles: Arc::new(PanickingStore),
        events: Arc::new(inner.clone()),
        reports: Arc::new(PanickingStore),
        conversations: Arc::new(inner),
    };
    let ctx = aggregator(stores, BackendRegistry::new())
        .build(&user(), QUESTION, None)
        .await;
    assert_eq!(ctx.reports, NO_REPORTS);
    assert_eq!(ctx.patient_context(), NO_PATIENT_CONTEXT);
    assert_eq!(ctx.degraded.len(), 2);
}

#[tokio::test]
async fn lifestyle_block_lists_averages() {
    let store = populated_store(&user(), 0).await.unwrap();
    let ctx = aggregator(Stores::all(store), BackendRegistry::new())
        .build(&user(), QUESTION, None)
        .await;
    assert_eq!(
        ctx.lifestyle.as_deref(),
        Some(
            "Recent Lifestyle (7 days):\n- Avg Sleep: 7.0 hours\n- Avg Exercise: 30.0 minutes\n- Avg Mood: 7.0/10\n- Avg Stress Level: 4.0/10"
        )
    );
    assert_eq!(ctx.reports, NO_REPORTS);
}

// ============================================================================
// QUERY ORCHESTRATION
// ============================================================================

#[tokio::test]
async fn generated_answer_is_high_confidence() {
    let echo = EchoGenerationBackend::new();
    let registry = with_generation(echo.clone())
        .with_knowledge(Arc::new(MockKnowledgeRetriever::new(["Iron deficiency causes fatigue."])));
    let orchestrator = orchestrator(registry).await;

    let result = orchestrator.answer(&user(), QUESTION, None).await;
    assert_answer(&result, QUESTION, Confidence::High);
    assert_eq!(result.reports_used, 3);

    let prompts = echo.prompts();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert_eq!(&result.answer, prompt);
    assert!(prompt.starts_with("You are MedSage"));
    assert!(prompt.contains("PATIENT CONTEXT:\nAge: 34"));
    assert!(prompt.contains("- Avg Sleep: 7.0 hours"));
    assert!(prompt.contains("RECENT MEDICAL REPORTS:\n--- Report 1: Report 4 (blood_test) ---"));
    assert!(prompt.contains("MEDICAL KNOWLEDGE BASE:\nIron deficiency causes fatigue."));
    assert!(prompt.contains(&format!("USER QUESTION: {}", QUESTION)));
}

#[tokio::test]
async fn generated_answer_is_returned_verbatim() {
    let reply = "\n  Drink water.\n\n- Rest well.  \n";
    let orchestrator = orchestrator(with_generation(CannedGenerationBackend::new(reply))).await;

    let result = orchestrator.answer(&user(), QUESTION, None).await;
    assert_eq!(result.confidence, Confidence::High);
    assert_eq!(result.answer, reply);

    let history = orchestrator.history(&user(), Some(1)).await;
    assert_eq!(history[0].answer, reply);
}

#[tokio::test]
async fn same_inputs_compose_the_same_prompt() {
    let echo = EchoGenerationBackend::new();
    let orchestrator = orchestrator(with_generation(echo.clone())).await;

    orchestrator.answer(&user(), QUESTION, None).await;
    orchestrator.answer(&user(), QUESTION, None).await;
    let prompts = echo.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], prompts[1]);
    assert!(DEFAULT_TEMPLATE.ends_with("RESPONSE:"));
}

#[tokio::test]
async fn missing_backend_uses_fallback() {
    let orchestrator = orchestrator(BackendRegistry::new()).await;
    let result = orchestrator.answer(&user(), QUESTION, None).await;

    assert_answer(&result, QUESTION, Confidence::Low);
    assert_quotes_question(&result);
    assert!(result.answer.contains("Based on your profile information:\nAge: 34"));
    assert_eq!(result.reports_used, 3);
}

#[tokio::test]
async fn backend_failures_use_fallback() {
    let backends: Vec<Arc<dyn GenerationBackend>> = vec![
        Arc::new(FailingGenerationBackend),
        Arc::new(PanickingGenerationBackend),
        Arc::new(BlankGenerationBackend),
    ];
    for backend in backends {
        let model = backend.model_id().to_string();
        let orchestrator = orchestrator(BackendRegistry::new().with_generation(backend)).await;
        let result = orchestrator.answer(&user(), QUESTION, None).await;
        assert_eq!(result.confidence, Confidence::Low, "backend {}", model);
        assert_quotes_question(&result);
    }
}

#[tokio::test(start_paused = true)]
async fn slow_backend_times_out_into_fallback() {
    let orchestrator = orchestrator(with_generation(SlowGenerationBackend {
        delay: Duration::from_secs(600),
    }))
    .await;
    let result = orchestrator.answer(&user(), QUESTION, None).await;
    assert_answer(&result, QUESTION, Confidence::Low);
    assert!(!result.answer.contains("too late"));
}

#[tokio::test]
async fn explicit_report_selection() {
    let store = populated_store(&user(), 0).await.unwrap();
    let chosen = fixtures::report(&user(), "Lipid panel", "LDL 130 mg/dL", "2024-01-15");
    let ids = [chosen.report_id];
    store.put_report(chosen).unwrap();
    store
        .put_report(fixtures::report(&user(), "Newer", "x", "2024-03-09"))
        .unwrap();

    let echo = EchoGenerationBackend::new();
    let orchestrator = QueryOrchestrator::assemble(
        Stores::all(store).collaborators(with_generation(echo.clone())),
        fast_config(),
    )
    .unwrap();

    let result = orchestrator.answer(&user(), QUESTION, Some(&ids[..])).await;
    assert_eq!(result.reports_used, 1);
    let prompt = &echo.prompts()[0];
    assert!(prompt.contains("--- Report 1: Lipid panel (blood_test) ---\nLDL 130 mg/dL"));
    assert!(!prompt.contains("Newer"));
}

// ============================================================================
// RECORDING
// ============================================================================

#[tokio::test]
async fn every_answer_is_recorded() {
    let orchestrator = orchestrator(BackendRegistry::new()).await;
    let result = orchestrator.answer(&user(), QUESTION, None).await;

    let history = orchestrator.history(&user(), None).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].question, QUESTION);
    assert_eq!(history[0].answer, result.answer);
    assert_eq!(history[0].confidence, Confidence::Low);
    assert_eq!(history[0].reports_used, 3);
}

#[tokio::test]
async fn recording_failure_does_not_change_the_result() {
    let baseline = orchestrator(with_generation(MockGenerationBackend::default()))
        .await
        .answer(&user(), QUESTION, None)
        .await;

    let conversation_stores: Vec<Arc<dyn ConversationStore>> =
        vec![Arc::new(FailingStore), Arc::new(PanickingStore)];
    for conversations in conversation_stores {
        let store = populated_store(&user(), 4).await.unwrap();
        let mut stores = Stores::all(store);
        stores.conversations = conversations;
        let orchestrator = QueryOrchestrator::assemble(
            stores.collaborators(with_generation(MockGenerationBackend::default())),
            fast_config(),
        )
        .unwrap();

        let result = orchestrator.answer(&user(), QUESTION, None).await;
        assert_eq!(result, baseline);
        assert!(orchestrator.history(&user(), None).await.is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn slow_recording_is_abandoned() {
    let store = populated_store(&user(), 1).await.unwrap();
    let mut stores = Stores::all(store.clone());
    stores.conversations = Arc::new(SlowStore::new(store.clone(), Duration::from_secs(60)));
    let orchestrator =
        QueryOrchestrator::assemble(stores.collaborators(BackendRegistry::new()), fast_config())
            .unwrap();

    let result = orchestrator.answer(&user(), QUESTION, None).await;
    assert_eq!(result.confidence, Confidence::Low);
    assert_eq!(store.conversation_count().unwrap(), 0);
}

// ============================================================================
// STATUS
// ============================================================================

#[tokio::test]
async fn status_reports_configured_components() {
    let orchestrator = orchestrator(with_generation(MockGenerationBackend::new("m")))
        .await;
    let status = orchestrator.status().await;
    assert_eq!(status.component("generation").unwrap().status, HealthStatus::Healthy);
    // An absent retriever only degrades the system; answers are still generated.
    let knowledge = status.component("knowledge").unwrap();
    assert_eq!(knowledge.status, HealthStatus::Degraded);
    assert_eq!(knowledge.message.as_deref(), Some("not configured"));
    assert_eq!(status.overall(), HealthStatus::Degraded);
}

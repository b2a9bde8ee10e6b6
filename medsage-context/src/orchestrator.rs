//! The question answering pipeline.
//!
//! Per query: build context, compose the prompt, generate (or fall back),
//! record best-effort, return. [`QueryOrchestrator::answer`] always returns a
//! [`QueryResult`]; nothing raises past it.

use crate::aggregator::{AggregatedContext, ContextAggregator};
use crate::fallback::{error_response, fallback_response};
use crate::prompt::{PromptInputs, PromptTemplate};
use crate::recorder::ConversationRecorder;
use futures_util::FutureExt;
use medsage_core::{
    Clock, Confidence, ConversationRecord, HealthCheck, LlmError, MedsageConfig, MedsageError,
    MedsageResult, QueryResult, ReportId, SystemStatus, UserId,
};
use medsage_llm::BackendRegistry;
use medsage_stats::InsightService;
use medsage_storage::{ConversationStore, EventStore, ProfileStore, ReportStore};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub profiles: Arc<dyn ProfileStore>,
    pub events: Arc<dyn EventStore>,
    pub reports: Arc<dyn ReportStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub registry: BackendRegistry,
    pub clock: Arc<dyn Clock>,
}

pub struct QueryOrchestrator {
    aggregator: ContextAggregator,
    registry: BackendRegistry,
    recorder: ConversationRecorder,
    template: PromptTemplate,
    clock: Arc<dyn Clock>,
    config: MedsageConfig,
}

impl QueryOrchestrator {
    /// Wire the pipeline from its collaborators.
    ///
    /// # Errors
    /// Returns a config error when `config` is invalid, or a prompt error when
    /// `config.prompt_template` does not parse.
    pub fn assemble(parts: Collaborators, config: MedsageConfig) -> MedsageResult<Self> {
        config.validate()?;
        let template = match config.prompt_template.as_deref() {
            Some(source) => PromptTemplate::parse(source)?,
            None => PromptTemplate::default(),
        };

        let insights = InsightService::new(parts.events, parts.clock.clone(), config.clone());
        let aggregator = ContextAggregator::new(
            parts.profiles,
            insights,
            parts.reports,
            parts.registry.clone(),
            config.clone(),
        );
        let recorder = ConversationRecorder::new(
            parts.conversations,
            parts.clock.clone(),
            config.recording_timeout(),
        );

        Ok(Self {
            aggregator,
            registry: parts.registry,
            recorder,
            template,
            clock: parts.clock,
            config,
        })
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn aggregator(&self) -> &ContextAggregator {
        &self.aggregator
    }

    /// Answer a question about the user's own health data.
    ///
    /// Confidence is `High` for a generated answer, `Low` for the fallback
    /// when the backend is absent or fails, and `Error` when the pipeline
    /// itself failed. The exchange is recorded on every path; a recording
    /// failure does not change the result.
    pub async fn answer(
        &self,
        user_id: &UserId,
        question: &str,
        report_ids: Option<&[ReportId]>,
    ) -> QueryResult {
        let result = match guard(self.evaluate(user_id, question, report_ids)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Query pipeline failed");
                self.error_result(question)
            }
        };

        self.recorder.record(user_id, question, &result).await;
        info!(
            user_id = %user_id,
            confidence = %result.confidence,
            reports_used = result.reports_used,
            "Query answered"
        );
        result
    }

    async fn evaluate(
        &self,
        user_id: &UserId,
        question: &str,
        report_ids: Option<&[ReportId]>,
    ) -> MedsageResult<QueryResult> {
        let context = self.aggregator.build(user_id, question, report_ids).await;
        let patient_context = context.patient_context();
        let prompt = self.compose(&context, &patient_context, question);
        debug!(user_id = %user_id, prompt_chars = prompt.len(), "Prompt composed");

        let (answer, confidence) = match self.generate(&prompt).await {
            Ok(text) => (text, Confidence::High),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Generation unavailable, using fallback");
                (fallback_response(question, &patient_context), Confidence::Low)
            }
        };

        Ok(QueryResult {
            query: question.to_string(),
            answer,
            confidence,
            timestamp: self.clock.now(),
            reports_used: context.reports_used,
        })
    }

    fn compose(&self, context: &AggregatedContext, patient_context: &str, question: &str) -> String {
        self.template.render(&PromptInputs {
            patient_context,
            report_context: &context.reports,
            medical_knowledge: &context.knowledge,
            question,
        })
    }

    /// Call the backend once. Absence, errors, panics, timeouts and blank
    /// output are all reported as `Err`.
    async fn generate(&self, prompt: &str) -> MedsageResult<String> {
        let backend = self.registry.generation()?;
        let limit = self.config.generation_timeout();
        let call = AssertUnwindSafe(backend.generate(prompt)).catch_unwind();

        match tokio::time::timeout(limit, call).await {
            Ok(Ok(Ok(text))) if !text.trim().is_empty() => Ok(text),
            Ok(Ok(Ok(_))) => Err(LlmError::InvalidResponse {
                provider: backend.model_id().to_string(),
                reason: "empty response".to_string(),
            }
            .into()),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(panic)) => Err(LlmError::InvalidResponse {
                provider: backend.model_id().to_string(),
                reason: format!("backend panicked: {}", panic_message(panic.as_ref())),
            }
            .into()),
            Err(_) => Err(LlmError::Timeout {
                provider: backend.model_id().to_string(),
                timeout_ms: limit.as_millis() as u64,
            }
            .into()),
        }
    }

    fn error_result(&self, question: &str) -> QueryResult {
        QueryResult {
            query: question.to_string(),
            answer: error_response(question),
            confidence: Confidence::Error,
            timestamp: self.clock.now(),
            reports_used: 0,
        }
    }

    /// Recent exchanges, newest first; `None` uses the configured page size.
    pub async fn history(&self, user_id: &UserId, limit: Option<usize>) -> Vec<ConversationRecord> {
        let limit = limit.unwrap_or(self.config.conversation_history_limit);
        self.recorder.history(user_id, limit).await
    }

    /// Health of the generation backend and knowledge retriever.
    pub async fn status(&self) -> SystemStatus {
        let limit = self.config.source_timeout();

        let generation = match self.registry.generation() {
            Ok(backend) => {
                let check = bounded_check("generation", limit, backend.health_check()).await;
                check.with_detail("model", backend.model_id())
            }
            Err(_) => HealthCheck::not_configured("generation"),
        };
        let knowledge = match self.registry.knowledge() {
            Ok(retriever) => {
                let check = bounded_check("knowledge", limit, retriever.health_check()).await;
                check.with_detail("retriever", retriever.name())
            }
            // Optional: answers are still generated without it.
            Err(_) => HealthCheck::degraded("knowledge", "not configured"),
        };

        SystemStatus::new(vec![generation, knowledge])
    }
}

/// Outer guard: a panic inside `fut` becomes `MedsageError::Unexpected`.
pub(crate) async fn guard<T, F>(fut: F) -> MedsageResult<T>
where
    F: Future<Output = MedsageResult<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(MedsageError::unexpected(panic_message(panic.as_ref()))),
    }
}

async fn bounded_check<F>(component: &str, limit: Duration, check: F) -> HealthCheck
where
    F: Future<Output = HealthCheck>,
{
    let started = Instant::now();
    let mut check = match tokio::time::timeout(limit, AssertUnwindSafe(check).catch_unwind()).await {
        Ok(Ok(check)) => check,
        Ok(Err(_)) => HealthCheck::unhealthy(component, "health check panicked"),
        Err(_) => HealthCheck::unhealthy(component, "health check timed out")
            .with_response_time(started.elapsed().as_millis() as u64),
    };
    check.component = component.to_string();
    check
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

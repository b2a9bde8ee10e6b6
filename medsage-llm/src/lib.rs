//! MedSage LLM - Generation and Retrieval Abstractions
//!
//! Provider-agnostic traits for the two external AI collaborators of the
//! query pipeline: the generation backend that turns a prompt into an answer,
//! and the knowledge retriever that supplies reference passages.

pub mod providers;

use ::async_trait::async_trait;
use medsage_core::{HealthCheck, KnowledgeSnippet, LlmError, MedsageError, MedsageResult};
use std::sync::Arc;

pub use providers::ollama::{OllamaConfig, OllamaGenerationBackend};

// ============================================================================
// GENERATION BACKEND TRAIT
// ============================================================================

/// Trait for text generation backends.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct LocalModel { /* ... */ }
///
/// #[async_trait]
/// impl GenerationBackend for LocalModel {
///     async fn generate(&self, prompt: &str) -> MedsageResult<String> {
///         // Call the model
///     }
///     fn model_id(&self) -> &str { "local" }
/// }
/// ```
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for a fully composed prompt.
    ///
    /// # Arguments
    /// * `prompt` - The prompt, sent verbatim
    ///
    /// # Returns
    /// * `Ok(String)` - The generated text
    /// * `Err(MedsageError::Llm)` - If the backend is unreachable or errors
    async fn generate(&self, prompt: &str) -> MedsageResult<String>;

    /// Get the model identifier for this backend.
    fn model_id(&self) -> &str;

    /// Report whether the backend can currently serve requests.
    async fn health_check(&self) -> HealthCheck {
        HealthCheck::healthy(self.model_id())
    }
}

// ============================================================================
// KNOWLEDGE RETRIEVER TRAIT
// ============================================================================

/// Trait for knowledge retrievers (vector stores, search indexes).
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    /// Find passages relevant to a question.
    ///
    /// # Arguments
    /// * `question` - The user's question, verbatim
    /// * `k` - Maximum number of passages to return
    ///
    /// # Returns
    /// * `Ok(Vec<KnowledgeSnippet>)` - At most `k` passages, most relevant first
    /// * `Err(MedsageError)` - If the retriever is unavailable
    async fn search(&self, question: &str, k: usize) -> MedsageResult<Vec<KnowledgeSnippet>>;

    /// Name used in status reports.
    fn name(&self) -> &str {
        "knowledge"
    }

    async fn health_check(&self) -> HealthCheck {
        HealthCheck::healthy(self.name())
    }
}

// ============================================================================
// BACKEND REGISTRY
// ============================================================================

/// Registry for the generation backend and knowledge retriever.
/// Both must be explicitly registered; either may be absent.
///
/// # Example
/// ```ignore
/// let mut registry = BackendRegistry::new();
/// registry.register_generation(Arc::new(OllamaGenerationBackend::new(OllamaConfig::from_env())));
///
/// let answer = registry.generation()?.generate(&prompt).await?;
/// ```
#[derive(Clone, Default)]
pub struct BackendRegistry {
    generation: Option<Arc<dyn GenerationBackend>>,
    knowledge: Option<Arc<dyn KnowledgeRetriever>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generation backend, replacing any previous one.
    pub fn register_generation(&mut self, backend: Arc<dyn GenerationBackend>) {
        self.generation = Some(backend);
    }

    /// Register a knowledge retriever, replacing any previous one.
    pub fn register_knowledge(&mut self, retriever: Arc<dyn KnowledgeRetriever>) {
        self.knowledge = Some(retriever);
    }

    pub fn with_generation(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.register_generation(backend);
        self
    }

    pub fn with_knowledge(mut self, retriever: Arc<dyn KnowledgeRetriever>) -> Self {
        self.register_knowledge(retriever);
        self
    }

    /// Get the registered generation backend.
    ///
    /// # Returns
    /// * `Err(MedsageError::Llm(LlmError::ProviderNotConfigured))` - If none is registered
    pub fn generation(&self) -> MedsageResult<Arc<dyn GenerationBackend>> {
        self.generation
            .clone()
            .ok_or(MedsageError::Llm(LlmError::ProviderNotConfigured))
    }

    /// Get the registered knowledge retriever.
    ///
    /// # Returns
    /// * `Err(MedsageError::Llm(LlmError::ProviderNotConfigured))` - If none is registered
    pub fn knowledge(&self) -> MedsageResult<Arc<dyn KnowledgeRetriever>> {
        self.knowledge
            .clone()
            .ok_or(MedsageError::Llm(LlmError::ProviderNotConfigured))
    }

    pub fn has_generation(&self) -> bool {
        self.generation.is_some()
    }

    pub fn has_knowledge(&self) -> bool {
        self.knowledge.is_some()
    }

    pub fn clear_generation(&mut self) {
        self.generation = None;
    }

    pub fn clear_knowledge(&mut self) {
        self.knowledge = None;
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("generation", &self.generation.as_ref().map(|g| g.model_id().to_string()))
            .field("knowledge", &self.knowledge.as_ref().map(|k| k.name().to_string()))
            .finish()
    }
}

// ============================================================================
// MOCK IMPLEMENTATIONS (for testing)
// ============================================================================

/// Mock generation backend for testing.
/// Deterministic: the answer embeds the prompt's length and final line.
#[derive(Debug, Clone)]
pub struct MockGenerationBackend {
    model_id: String,
}

impl MockGenerationBackend {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new("mock-generator")
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> MedsageResult<String> {
        let last_line = prompt.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
        Ok(format!(
            "[{}] answered a {}-char prompt ending with: {}",
            self.model_id,
            prompt.chars().count(),
            last_line.trim()
        ))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Mock knowledge retriever returning a fixed list of passages.
#[derive(Debug, Clone, Default)]
pub struct MockKnowledgeRetriever {
    snippets: Vec<KnowledgeSnippet>,
}

impl MockKnowledgeRetriever {
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            snippets: texts.into_iter().map(KnowledgeSnippet::new).collect(),
        }
    }
}

#[async_trait]
impl KnowledgeRetriever for MockKnowledgeRetriever {
    async fn search(&self, _question: &str, k: usize) -> MedsageResult<Vec<KnowledgeSnippet>> {
        Ok(self.snippets.iter().take(k).cloned().collect())
    }

    fn name(&self) -> &str {
        "mock-knowledge"
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The mock retriever never returns more than k passages.
        #[test]
        fn prop_mock_retriever_bounded(
            texts in prop::collection::vec("[a-z]{1,12}", 0..20),
            k in 0usize..10
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let retriever = MockKnowledgeRetriever::new(texts.clone());
            let found = rt.block_on(retriever.search("q", k)).unwrap();
            prop_assert_eq!(found.len(), texts.len().min(k));
        }
    }
}

//! Error types for MedSage operations

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Insert failed for {entity}: {reason}")]
    InsertFailed { entity: String, reason: String },

    #[error("Store {store} unavailable: {reason}")]
    Unavailable { store: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Generation backend and retriever errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No generation backend configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },
}

/// Validation errors for journal writes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Value {value} for {field} outside range {min}..={max}")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Statistical projection errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("Insufficient data: need at least {required} qualifying entries, found {found}")]
    InsufficientData { required: usize, found: usize },

    #[error("Projected date out of range: {reason}")]
    DateOutOfRange { reason: String },
}

/// Per-source context assembly errors.
///
/// These never leave the aggregator; each one degrades a single context block.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("Context source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("Context source {source_name} timed out after {timeout_ms}ms")]
    SourceTimeout { source_name: String, timeout_ms: u64 },

    #[error("Context source {source_name} panicked")]
    SourcePanicked { source_name: String },
}

/// Prompt template errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("Template is missing required placeholder {{{name}}}")]
    MissingPlaceholder { name: String },

    #[error("Template uses unknown placeholder {{{name}}}")]
    UnknownPlaceholder { name: String },

    #[error("Unterminated placeholder starting at byte {position}")]
    Unterminated { position: usize },
}

/// Master error type for all MedSage errors.
#[derive(Debug, Clone, Error)]
pub enum MedsageError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Stats error: {0}")]
    Stats(#[from] StatsError),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Unexpected error: {reason}")]
    Unexpected { reason: String },
}

impl MedsageError {
    pub fn unexpected(reason: impl Into<String>) -> Self {
        Self::Unexpected {
            reason: reason.into(),
        }
    }
}

/// Result type alias for MedSage operations.
pub type MedsageResult<T> = Result<T, MedsageError>;

// =============================================================================
// TESTS
// =============================================================================

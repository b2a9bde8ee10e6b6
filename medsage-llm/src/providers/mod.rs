//! Generation backend implementations

pub mod ollama;

pub use ollama::{OllamaConfig, OllamaGenerationBackend};

use medsage_core::{LlmError, MedsageError};

pub(crate) fn request_failed(provider: &str, status: i32, message: impl Into<String>) -> MedsageError {
    MedsageError::Llm(LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> MedsageError {
    MedsageError::Llm(LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}

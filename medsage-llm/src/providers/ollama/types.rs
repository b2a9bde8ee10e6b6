//! Ollama API request and response types

use serde::{Deserialize, Serialize};

// ============================================================================
// GENERATION TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

// ============================================================================
// MODEL TYPES
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

impl ListModelsResponse {
    /// Whether `model` is pulled, with or without an explicit tag.
    pub fn contains(&self, model: &str) -> bool {
        let tagged = format!("{}:", model);
        self.models
            .iter()
            .any(|m| m.name == model || m.name.starts_with(&tagged))
    }
}

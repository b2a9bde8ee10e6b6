//! Ollama generation backend

use super::types::{GenerateOptions, GenerateRequest, GenerateResponse, ListModelsResponse};
use super::OllamaConfig;
use crate::providers::{invalid_response, request_failed};
use crate::GenerationBackend;
use async_trait::async_trait;
use medsage_core::{HealthCheck, MedsageResult};
use reqwest::Client;
use std::time::Instant;
use tracing::debug;

const PROVIDER: &str = "ollama";

/// Generation backend for a local Ollama server.
pub struct OllamaGenerationBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaGenerationBackend {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Check if the model is pulled on the server.
    pub async fn check_model_available(&self) -> MedsageResult<bool> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            request_failed(PROVIDER, 0, format!("Failed to connect to Ollama: {}", e))
        })?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let list: ListModelsResponse = response.json().await.map_err(|e| {
            invalid_response(PROVIDER, format!("Failed to parse models list: {}", e))
        })?;
        Ok(list.contains(&self.config.model))
    }
}

#[async_trait]
impl GenerationBackend for OllamaGenerationBackend {
    async fn generate(&self, prompt: &str) -> MedsageResult<String> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        let url = format!("{}/api/generate", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(request_failed(PROVIDER, i32::from(status.as_u16()), error_text));
        }

        let generated: GenerateResponse = response.json().await.map_err(|e| {
            invalid_response(PROVIDER, format!("Failed to parse response: {}", e))
        })?;
        debug!(model = %self.config.model, chars = generated.response.len(), "Generation complete");
        Ok(generated.response)
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn health_check(&self) -> HealthCheck {
        let started = Instant::now();
        let result = self.check_model_available().await;
        let elapsed = started.elapsed().as_millis() as u64;

        let check = match result {
            Ok(true) => HealthCheck::healthy(PROVIDER),
            Ok(false) => HealthCheck::degraded(
                PROVIDER,
                format!("model {} is not available on the server", self.config.model),
            ),
            Err(e) => HealthCheck::unhealthy(PROVIDER, e.to_string()),
        };
        check
            .with_response_time(elapsed)
            .with_detail("model", self.config.model.clone())
            .with_detail("base_url", self.config.base_url.clone())
    }
}

impl std::fmt::Debug for OllamaGenerationBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaGenerationBackend")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("temperature", &self.config.temperature)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsage_core::{HealthStatus, LlmError, MedsageError};

    fn unreachable() -> OllamaGenerationBackend {
        // Port 9 (discard) is closed on test machines; connections are refused.
        OllamaGenerationBackend::new(OllamaConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_model_id_and_debug() {
        let backend = OllamaGenerationBackend::new(OllamaConfig::default());
        assert_eq!(backend.model_id(), "llama3");
        let debug = format!("{:?}", backend);
        assert!(debug.contains("localhost:11434"));
    }

    #[tokio::test]
    async fn test_generate_unreachable_is_request_failed() {
        let err = unreachable().generate("hello").await.unwrap_err();
        assert!(matches!(
            err,
            MedsageError::Llm(LlmError::RequestFailed { status: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_health_check_unreachable_is_unhealthy() {
        let check = unreachable().health_check().await;
        assert_eq!(check.status, HealthStatus::Unhealthy);
        assert_eq!(check.details.get("model").map(String::as_str), Some("llama3"));
        assert!(check.response_time_ms.is_some());
    }
}

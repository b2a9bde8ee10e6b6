use serde::{Deserialize, Serialize};

/// Connection settings for a local Ollama server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.2,
        }
    }
}

impl OllamaConfig {
    /// Create OllamaConfig from environment variables.
    ///
    /// Environment variables:
    /// - `MEDSAGE_OLLAMA_BASE_URL` (default: "http://localhost:11434")
    /// - `MEDSAGE_OLLAMA_MODEL` (default: "llama3")
    /// - `MEDSAGE_OLLAMA_TEMPERATURE` (default: 0.2)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Self {
            base_url: non_empty("MEDSAGE_OLLAMA_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            model: non_empty("MEDSAGE_OLLAMA_MODEL").unwrap_or(defaults.model),
            temperature: non_empty("MEDSAGE_OLLAMA_TEMPERATURE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.temperature),
        }
    }
}

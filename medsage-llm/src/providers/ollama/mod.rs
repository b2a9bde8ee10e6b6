//! Ollama generation backend (local models)

mod config;
pub mod generation;
pub mod types;

pub use config::OllamaConfig;
pub use generation::OllamaGenerationBackend;

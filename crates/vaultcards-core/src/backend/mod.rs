//! Generation backends
//!
//! Two local inference servers share one contract: take a prompt, return
//! the generated text. They differ only in endpoint path, payload shape and
//! reply envelope.

pub mod endpoint;
pub mod lmstudio;
pub mod ollama;

use crate::config::{GenerationConfig, Provider};
use crate::error::BackendError;

pub use endpoint::{BackendConfig, RetryPolicy};
pub use lmstudio::LmStudioBackend;
pub use ollama::OllamaBackend;

/// One logical generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Human-readable origin (file and part), used in logs
    pub source: String,
}

/// Generated text and how many attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResponse {
    pub text: String,
    pub attempts: u32,
}

/// A text-generation server
pub trait GenerationBackend: Send + Sync {
    fn provider(&self) -> Provider;

    /// Generate a reply, retrying transient failures
    fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, BackendError>;

    /// Check the server is reachable before a run
    fn health_check(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Build the backend selected by `config.provider`
pub fn create_backend(config: &GenerationConfig) -> Box<dyn GenerationBackend> {
    let backend_config = BackendConfig::from_config(config);
    match config.provider {
        Provider::Ollama => Box::new(OllamaBackend::new(backend_config)),
        Provider::LmStudio => Box::new(LmStudioBackend::new(backend_config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_backend_dispatches_on_provider() {
        let ollama = create_backend(&GenerationConfig::default());
        assert_eq!(ollama.provider(), Provider::Ollama);

        let lmstudio = create_backend(&GenerationConfig {
            provider: Provider::LmStudio,
            ..GenerationConfig::default()
        });
        assert_eq!(lmstudio.provider(), Provider::LmStudio);
    }
}

//! Ollama: `POST /api/generate`, reply text under `response`

use serde::Deserialize;
use serde_json::json;

use super::endpoint::{BackendConfig, HttpClient};
use super::{GenerationBackend, GenerationRequest, GenerationResponse};
use crate::config::Provider;
use crate::error::{BackendError, BackendErrorKind};

pub const GENERATE_PATH: &str = "/api/generate";
pub const HEALTH_PATH: &str = "/api/tags";

#[derive(Debug, Deserialize)]
struct GenerateReply {
    response: String,
}

pub struct OllamaBackend {
    config: BackendConfig,
    client: HttpClient,
}

impl OllamaBackend {
    pub fn new(config: BackendConfig) -> Self {
        let client = HttpClient::new(Provider::Ollama, config.timeout);
        Self { config, client }
    }

    fn payload(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "top_p": self.config.top_p,
                "num_predict": self.config.max_tokens,
            },
        })
    }

    fn generate_once(&self, prompt: &str) -> Result<String, BackendError> {
        let body = self
            .client
            .post_json(&self.config.url(GENERATE_PATH), &self.payload(prompt))?;
        decode_reply(&body)
    }
}

fn decode_reply(body: &str) -> Result<String, BackendError> {
    serde_json::from_str::<GenerateReply>(body)
        .map(|reply| reply.response)
        .map_err(|e| {
            BackendError::new(
                Provider::Ollama,
                BackendErrorKind::MalformedEnvelope(e.to_string()),
            )
        })
}

impl GenerationBackend for OllamaBackend {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, BackendError> {
        let (text, attempts) = self
            .config
            .retry
            .run(&request.source, || self.generate_once(&request.prompt))?;
        Ok(GenerationResponse { text, attempts })
    }

    fn health_check(&self) -> Result<(), BackendError> {
        self.client.get(&self.config.url(HEALTH_PATH)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;

    #[test]
    fn test_payload_shape() {
        let mut config = GenerationConfig::default();
        config.resolve();
        let backend = OllamaBackend::new(BackendConfig::from_config(&config));
        let payload = backend.payload("hello");

        assert_eq!(payload["model"], "gemma3");
        assert_eq!(payload["prompt"], "hello");
        assert_eq!(payload["stream"], false);
        assert_eq!(payload["options"]["num_predict"], 1500);
    }

    #[test]
    fn test_decode_reply() {
        assert_eq!(
            decode_reply(r#"{"model":"gemma3","response":"Q | A","done":true}"#).unwrap(),
            "Q | A"
        );
        let err = decode_reply(r#"{"done":true}"#).unwrap_err();
        assert!(matches!(err.kind, BackendErrorKind::MalformedEnvelope(_)));
        assert!(!err.is_transient());
    }
}

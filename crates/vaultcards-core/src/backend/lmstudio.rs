//! LM Studio: OpenAI-compatible `POST /v1/chat/completions`

use serde::Deserialize;
use serde_json::json;

use super::endpoint::{BackendConfig, HttpClient};
use super::{GenerationBackend, GenerationRequest, GenerationResponse};
use crate::config::Provider;
use crate::error::{BackendError, BackendErrorKind};

pub const CHAT_PATH: &str = "/v1/chat/completions";
pub const HEALTH_PATH: &str = "/v1/models";

#[derive(Debug, Deserialize)]
struct ChatReply {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

pub struct LmStudioBackend {
    config: BackendConfig,
    client: HttpClient,
}

impl LmStudioBackend {
    pub fn new(config: BackendConfig) -> Self {
        let client = HttpClient::new(Provider::LmStudio, config.timeout);
        Self { config, client }
    }

    fn payload(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "user", "content": prompt },
            ],
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "max_tokens": self.config.max_tokens,
            "stream": false,
        })
    }

    fn generate_once(&self, prompt: &str) -> Result<String, BackendError> {
        let body = self
            .client
            .post_json(&self.config.url(CHAT_PATH), &self.payload(prompt))?;
        decode_reply(&body)
    }
}

fn decode_reply(body: &str) -> Result<String, BackendError> {
    let malformed =
        |reason: String| BackendError::new(Provider::LmStudio, BackendErrorKind::MalformedEnvelope(reason));

    let reply: ChatReply = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    reply
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| malformed("reply has no choices".to_string()))
}

impl GenerationBackend for LmStudioBackend {
    fn provider(&self) -> Provider {
        Provider::LmStudio
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

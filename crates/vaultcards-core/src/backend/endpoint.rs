//! HTTP plumbing shared by the generation backends
//!
//! - Connection settings derived from [`GenerationConfig`]
//! - A blocking JSON client with a fixed User-Agent
//! - Mapping of transport failures onto [`BackendErrorKind`]
//! - Retry with exponential backoff for transient failures

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{GenerationConfig, Provider};
use crate::error::{BackendError, BackendErrorKind};

/// Longest slice of an error body kept in a [`BackendErrorKind::Status`]
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Everything a backend needs to reach its server
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub provider: Provider,
    /// Base URL without a trailing slash
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl BackendConfig {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            provider: config.provider,
            base_url: config.base_url().to_string(),
            model: config.model().to_string(),
            timeout: Duration::from_secs(config.timeout_seconds),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.retry_backoff_ms),
            },
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Blocking JSON client bound to one provider
pub struct HttpClient {
    provider: Provider,
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpClient {
    pub fn new(provider: Provider, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        let user_agent = format!(
            "vaultcards/{} ({})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS
        );

        Self {
            provider,
            agent: ureq::Agent::new_with_config(config),
            user_agent,
        }
    }

    /// POST a JSON payload and return the body of a 2xx reply
    pub fn post_json(&self, url: &str, payload: &serde_json::Value) -> Result<String, BackendError> {
        let body = serde_json::to_string(payload)
            .map_err(|e| self.error(BackendErrorKind::Transport(e.to_string())))?;

        debug!(provider = %self.provider, url, bytes = body.len(), "POST");
        let response = self
            .agent
            .post(url)
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.user_agent)
            .send(body.as_str())
            .map_err(|e| self.classify(e))?;

        self.read_body(response)
    }

    /// GET `url` and return the body of a 2xx reply
    pub fn get(&self, url: &str) -> Result<String, BackendError> {
        debug!(provider = %self.provider, url, "GET");
        let response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| self.classify(e))?;

        self.read_body(response)
    }

    fn read_body(&self, mut response: ureq::http::Response<ureq::Body>) -> Result<String, BackendError> {
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| self.classify(e))?;

        if (200..300).contains(&status) {
            Ok(body)
        } else {
            Err(self.error(BackendErrorKind::Status {
                code: status,
                body: truncate(body.trim(), MAX_ERROR_BODY_CHARS),
            }))
        }
    }

    fn error(&self, kind: BackendErrorKind) -> BackendError {
        BackendError::new(self.provider, kind)
    }

    fn classify(&self, error: ureq::Error) -> BackendError {
        self.error(classify_transport(error))
    }
}

/// Map a ureq failure onto the backend error taxonomy
pub fn classify_transport(error: ureq::Error) -> BackendErrorKind {
    match error {
        ureq::Error::StatusCode(code) => BackendErrorKind::Status {
            code,
            body: String::new(),
        },
        ureq::Error::Timeout(_) => BackendErrorKind::Timeout,
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => {
            BackendErrorKind::ConnectionRefused(error.to_string())
        }
        ureq::Error::Io(io) => match io.kind() {
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::NotConnected => {
                BackendErrorKind::ConnectionRefused(io.to_string())
            }
            std::io::ErrorKind::TimedOut => BackendErrorKind::Timeout,
            _ => BackendErrorKind::Transport(io.to_string()),
        },
        other => BackendErrorKind::Transport(other.to_string()),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Retry schedule for transient backend failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    ///
    /// On success returns the value and the number of attempts made. 4xx
    /// statuses and malformed envelopes are returned at once.
    pub fn run<T, F>(&self, label: &str, mut op: F) -> Result<(T, u32), BackendError>
    where
        F: FnMut() -> Result<T, BackendError>,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                std::thread::sleep(self.backoff(attempt));
            }
            attempt += 1;

            match op() {
                Ok(value) => return Ok((value, attempt)),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    warn!(
                        source = label,
                        attempt,
                        max_attempts = self.max_retries + 1,
                        error = %e,
                        "Generation failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn server_error() -> BackendError {
        BackendError::new(
            Provider::Ollama,
            BackendErrorKind::Status {
                code: 500,
                body: String::new(),
            },
        )
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_retries_transient_until_success() {
        let calls = Cell::new(0);
        let result = policy(3).run("note.md", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(server_error())
            } else {
                Ok("reply")
            }
        });
        assert_eq!(result.unwrap(), ("reply", 3));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let calls = Cell::new(0);
        let result: Result<((), u32), _> = policy(2).run("note.md", || {
            calls.set(calls.get() + 1);
            Err(server_error())
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<((), u32), _> = policy(5).run("note.md", || {
            calls.set(calls.get() + 1);
            Err(BackendError::new(
                Provider::LmStudio,
                BackendErrorKind::Status {
                    code: 404,
                    body: "model not found".to_string(),
                },
            ))
        });
        assert!(result.unwrap_err().is_configuration_error());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_from_config_uses_provider_defaults() {
        let mut config = GenerationConfig {
            provider: Provider::LmStudio,
            ..GenerationConfig::default()
        };
        config.resolve();
        let backend = BackendConfig::from_config(&config);
        assert_eq!(backend.url("/v1/models"), "http://localhost:1234/v1/models");
        assert_eq!(backend.model, "local-model");
        assert_eq!(backend.retry.max_retries, 3);
    }

    #[test]
    fn test_truncate_error_body() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}

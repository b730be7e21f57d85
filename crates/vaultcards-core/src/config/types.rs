//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::VaultcardsError;

/// Providers accepted on the command line and in config files
pub const SUPPORTED_PROVIDERS: &str = "ollama, lmstudio";

/// Local inference server flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Ollama: `POST /api/generate`, reply under `response`
    #[default]
    Ollama,
    /// LM Studio: OpenAI-compatible `POST /v1/chat/completions`
    #[serde(alias = "lm-studio", alias = "lm_studio")]
    LmStudio,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::LmStudio => "lmstudio",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Ollama => "http://localhost:11434",
            Provider::LmStudio => "http://localhost:1234",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Ollama => "gemma3",
            Provider::LmStudio => "local-model",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = VaultcardsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "lmstudio" | "lm-studio" | "lm_studio" => Ok(Provider::LmStudio),
            other => Err(VaultcardsError::unsupported(
                "provider",
                other,
                SUPPORTED_PROVIDERS,
            )),
        }
    }
}

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 2000;
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 6000;
pub const DEFAULT_LOOK_BACK: usize = 500;
pub const DEFAULT_MIN_CONTENT_CHARS: usize = 100;
pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_OUTPUT_PATH: &str = "flashcards_anki.csv";

/// Smallest chunk size accepted; anything lower fragments notes into noise
pub const MIN_CHUNK_SIZE: usize = 200;
pub const MAX_CONCURRENCY: usize = 8;

/// Settings for one generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Inference server flavour
    #[serde(default)]
    pub provider: Provider,

    /// Server base URL (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model name (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff between attempts
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Notes longer than this many characters are chunked
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Window around each cut point searched for a natural boundary
    #[serde(default = "default_look_back")]
    pub look_back: usize,

    /// Notes with less meaningful text than this are skipped
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Language assumed when detection is inconclusive
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Concurrent generation calls (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Sampling temperature forwarded to the backend
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling forwarded to the backend
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Upper bound on generated tokens per chunk
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Case-insensitive path fragments excluded from discovery
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Tags added to every card
    #[serde(default = "default_base_tags")]
    pub base_tags: Vec<String>,

    /// Destination of the delimited export
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Convert card text to Anki-flavoured HTML on export
    #[serde(default)]
    pub html: bool,

    /// Per-stage progress logging
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            base_url: None,
            model: None,
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_chunk_size: default_max_chunk_size(),
            look_back: default_look_back(),
            min_content_chars: default_min_content_chars(),
            default_language: default_language(),
            concurrency: default_concurrency(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            ignore_patterns: default_ignore_patterns(),
            base_tags: default_base_tags(),
            output_path: default_output_path(),
            html: false,
            verbose: false,
        }
    }
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

fn default_look_back() -> usize {
    DEFAULT_LOOK_BACK
}

fn default_min_content_chars() -> usize {
    DEFAULT_MIN_CONTENT_CHARS
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_ignore_patterns() -> Vec<String> {
    vec![
        ".obsidian".to_string(),
        "template".to_string(),
        ".trash".to_string(),
    ]
}

fn default_base_tags() -> Vec<String> {
    vec!["obsidian".to_string()]
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

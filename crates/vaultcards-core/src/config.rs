//! Run configuration for vaultcards
//!
//! Layering, lowest precedence first: built-in defaults, an optional TOML
//! file, `VAULTCARDS_*` environment variables, then command-line overrides
//! applied by the binary. Provider-dependent defaults are filled in last by
//! [`GenerationConfig::resolve`].

pub mod types;

use std::fs;
use std::path::Path;

use crate::error::{Result, VaultcardsError};
use crate::{bail_invalid, bail_usage};

pub use types::{
    GenerationConfig, Provider, DEFAULT_LANGUAGE, DEFAULT_LOOK_BACK, DEFAULT_MAX_CHUNK_SIZE,
    DEFAULT_MAX_RETRIES, DEFAULT_MIN_CONTENT_CHARS, DEFAULT_OUTPUT_PATH, DEFAULT_TIMEOUT_SECONDS,
    MAX_CONCURRENCY, MIN_CHUNK_SIZE, SUPPORTED_PROVIDERS,
};

pub const ENV_PROVIDER: &str = "VAULTCARDS_PROVIDER";
pub const ENV_MODEL: &str = "VAULTCARDS_MODEL";
pub const ENV_BASE_URL: &str = "VAULTCARDS_BASE_URL";
pub const ENV_TIMEOUT: &str = "VAULTCARDS_TIMEOUT";
pub const ENV_RETRIES: &str = "VAULTCARDS_RETRIES";

impl GenerationConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| VaultcardsError::io_operation("read config", path.display(), e))?;
        let config: GenerationConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults, optionally overlaid by a config file, then by the process
    /// environment.
    pub fn layered(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    ///
    /// Numeric values are clamped to sane ranges rather than rejected; an
    /// unknown provider name is a usage error.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get(ENV_PROVIDER) {
            self.provider = provider.parse()?;
        }

        if let Some(model) = get(ENV_MODEL) {
            self.model = Some(model);
        }

        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = Some(url);
        }

        if let Some(timeout) = get(ENV_TIMEOUT) {
            if let Ok(seconds) = timeout.trim().parse::<u64>() {
                self.timeout_seconds = seconds.clamp(5, 600);
            }
        }

        if let Some(retries) = get(ENV_RETRIES) {
            if let Ok(count) = retries.trim().parse::<u32>() {
                self.max_retries = count.clamp(0, 10);
            }
        }

        Ok(())
    }

    /// Fill provider-dependent defaults for anything left unset
    pub fn resolve(&mut self) {
        if self.base_url.is_none() {
            self.base_url = Some(self.provider.default_base_url().to_string());
        }
        if self.model.is_none() {
            self.model = Some(self.provider.default_model().to_string());
        }
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Reject combinations the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size < MIN_CHUNK_SIZE {
            bail_invalid!(
                "max chunk size",
                format!("{} (minimum {})", self.max_chunk_size, MIN_CHUNK_SIZE)
            );
        }

        if self.look_back >= self.max_chunk_size {
            bail_invalid!(
                "look-back window",
                format!(
                    "{} (must be smaller than max chunk size {})",
                    self.look_back, self.max_chunk_size
                )
            );
        }

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            bail_invalid!(
                "concurrency",
                format!("{} (expected 1..={})", self.concurrency, MAX_CONCURRENCY)
            );
        }

        if self.timeout_seconds == 0 {
            bail_invalid!("timeout", "0 seconds");
        }

        let url = self.base_url();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail_invalid!("base URL", url);
        }

        if self.model().trim().is_empty() {
            bail_usage!("model name must not be empty");
        }

        if self.default_language.trim().is_empty() {
            bail_usage!("default language must not be empty");
        }

        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VaultcardsError::Other(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)
            .map_err(|e| VaultcardsError::io_operation("write config", path.display(), e))?;
        Ok(())
    }
}

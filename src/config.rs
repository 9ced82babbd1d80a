//! Runtime settings and credential resolution.
//!
//! Settings come from an optional JSON file; every field has a default so an
//! empty object (or no file at all) is a valid configuration. Relative paths
//! resolve against the data directory. Secrets never live in the settings
//! file: they are read from a key file next to the data directory or from an
//! environment variable.
use crate::lm::{
    ChatCompletionsBackend, CommandBackend, EnrichmentClient, GenerationOptions, LmBackend,
};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration problems that stop the process at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{what} not found: set {env_var} or create {}", .file.display())]
    MissingCredential {
        what: &'static str,
        env_var: String,
        file: PathBuf,
    },
}

/// Top-level settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Base `[name, url]` list.
    pub base_list: PathBuf,
    /// Enriched store written by the worker and read by the server.
    pub enriched_store: PathBuf,
    /// Baseline store copied into place when the store is empty.
    pub seed_store: Option<PathBuf>,
    pub api_key_file: PathBuf,
    pub api_key_env: String,
    pub endpoint_key_file: PathBuf,
    pub endpoint_key_env: String,
    /// Pause between consecutive LM requests.
    pub request_delay_ms: u64,
    /// Emit a progress line every N base entries.
    pub progress_every: usize,
    /// Pause between full passes of the service worker.
    pub rescan_interval_secs: u64,
    pub retry: RetryPolicy,
    pub lm: LmSettings,
    pub listen_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_list: PathBuf::from("us_universities.csv"),
            enriched_store: PathBuf::from("us_universities_enriched.csv"),
            seed_store: None,
            api_key_file: PathBuf::from("../gpt-key.txt"),
            api_key_env: "GPT_API_KEY".to_string(),
            endpoint_key_file: PathBuf::from("../endpoint-key.txt"),
            endpoint_key_env: "ENDPOINT_KEY".to_string(),
            request_delay_ms: 6_000,
            progress_every: 10,
            rescan_interval_secs: 3_600,
            retry: RetryPolicy::default(),
            lm: LmSettings::default(),
            listen_addr: "0.0.0.0:5000".to_string(),
        }
    }
}

/// What to do when a request fails for transport reasons.
///
/// `max_attempts = 1` means a failed item is skipped until the next pass.
/// Unparseable replies are never retried.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// LM backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LmSettings {
    /// Local command to run instead of the HTTP API (e.g. `ollama run llama3`).
    pub command: Option<String>,
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LmSettings {
    fn default() -> Self {
        let options = GenerationOptions::default();
        Self {
            command: None,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        }
    }
}

/// Settings with every path resolved against the data directory.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub data_dir: PathBuf,
    pub settings: Settings,
}

impl ResolvedSettings {
    pub fn new(data_dir: PathBuf, settings: Settings) -> Self {
        Self { data_dir, settings }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn base_list_path(&self) -> PathBuf {
        self.resolve(&self.settings.base_list)
    }

    pub fn enriched_store_path(&self) -> PathBuf {
        self.resolve(&self.settings.enriched_store)
    }

    pub fn seed_store_path(&self) -> Option<PathBuf> {
        self.settings
            .seed_store
            .as_deref()
            .map(|path| self.resolve(path))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.settings.request_delay_ms)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.settings.rescan_interval_secs)
    }

    /// LM credential; required by the HTTP backend.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        let file = self.resolve(&self.settings.api_key_file);
        resolve_secret(&file, &self.settings.api_key_env).ok_or(ConfigError::MissingCredential {
            what: "LM API key",
            env_var: self.settings.api_key_env.clone(),
            file,
        })
    }

    /// Shared secret for the query endpoint; `None` disables the endpoint.
    pub fn endpoint_key(&self) -> Option<String> {
        let file = self.resolve(&self.settings.endpoint_key_file);
        resolve_secret(&file, &self.settings.endpoint_key_env)
    }

    /// Build the configured enrichment client.
    pub fn enrichment_client(&self) -> Result<EnrichmentClient> {
        let lm = &self.settings.lm;
        let backend: Box<dyn LmBackend> = match lm.command.as_deref() {
            Some(command) => Box::new(CommandBackend::parse(command)?),
            None => Box::new(ChatCompletionsBackend::new(
                &lm.api_base,
                &lm.model,
                self.api_key()?,
            )),
        };
        Ok(EnrichmentClient::new(
            backend,
            GenerationOptions {
                temperature: lm.temperature,
                max_tokens: lm.max_tokens,
            },
        ))
    }
}

/// Load settings from `path`, or defaults when no path is given.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let bytes = fs::read(path).with_context(|| format!("read settings {}", path.display()))?;
    let settings: Settings = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse settings JSON {}", path.display()))?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Reject settings that would make the pipeline misbehave.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.progress_every == 0 {
        return Err(anyhow!("progress_every must be at least 1"));
    }
    if settings.retry.max_attempts == 0 {
        return Err(anyhow!("retry.max_attempts must be at least 1"));
    }
    if !(0.0..=2.0).contains(&settings.lm.temperature) {
        return Err(anyhow!(
            "lm.temperature must be within 0.0..=2.0 (got {})",
            settings.lm.temperature
        ));
    }
    if settings.lm.max_tokens == 0 {
        return Err(anyhow!("lm.max_tokens must be at least 1"));
    }
    if let Some(command) = settings.lm.command.as_deref() {
        if command.trim().is_empty() {
            return Err(anyhow!("lm.command must be non-empty when set"));
        }
    }
    if settings.listen_addr.trim().is_empty() {
        return Err(anyhow!("listen_addr must be non-empty"));
    }
    Ok(())
}

/// Resolve a secret: the key file first, then the environment variable.
///
/// Blank values count as absent.
pub fn resolve_secret(file: &Path, env_var: &str) -> Option<String> {
    let from_file = fs::read_to_string(file)
        .ok()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    from_file.or_else(|| {
        std::env::var(env_var)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

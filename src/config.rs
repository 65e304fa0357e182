use crate::models::Task;
use crate::prompts::Technique;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings for the model gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// OpenAI-compatible API endpoint
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Environment variable name containing the API key
    #[serde(default = "default_env_var_api_key")]
    pub env_var_api_key: String,
    /// Sampling temperature; 0 keeps scores comparable across runs
    #[serde(default)]
    pub temperature: f32,
    /// Maximum tokens for response generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u16,
    /// Rate limit for API requests per second
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: f64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            env_var_api_key: default_env_var_api_key(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            rate_limit_rps: default_rate_limit(),
        }
    }
}

/// Retry settings for gateway calls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Attempts per call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Configuration for one evaluation run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Model identifiers passed to the gateway
    pub models: Vec<String>,
    #[serde(default = "default_tasks")]
    pub tasks: Vec<Task>,
    #[serde(default = "default_techniques")]
    pub techniques: Vec<Technique>,
    /// Maximum items evaluated per (model, task, technique)
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
    /// Shuffle seed for item sampling
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// How many (model, task, technique) triples may run at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Directory for timestamped snapshots
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Directory of `<task>.jsonl` item files; built-in items when absent
    #[serde(default)]
    pub items_dir: Option<PathBuf>,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_title() -> String {
    "evaluation".to_string()
}

fn default_api_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_env_var_api_key() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_tokens() -> u16 {
    1000
}

fn default_rate_limit() -> f64 {
    10.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_tasks() -> Vec<Task> {
    Task::ALL.to_vec()
}

fn default_techniques() -> Vec<Technique> {
    Technique::ALL.to_vec()
}

pub(crate) fn default_sample_limit() -> usize {
    5
}

pub(crate) fn default_seed() -> u64 {
    42
}

pub(crate) fn default_concurrency() -> usize {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("evaluation_results")
}

impl RunConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: RunConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            bail!("At least one model is required");
        }
        if self.models.iter().any(|m| m.trim().is_empty()) {
            bail!("Model identifiers must not be blank");
        }
        if self.tasks.is_empty() {
            bail!("At least one task is required");
        }
        if self.techniques.is_empty() {
            bail!("At least one technique is required");
        }
        ensure_unique("model", &self.models)?;
        ensure_unique("task", &self.tasks)?;
        ensure_unique("technique", &self.techniques)?;
        if self.sample_limit == 0 {
            bail!("sample_limit must be at least 1");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        Ok(())
    }
}

fn ensure_unique<T: Eq + Hash + std::fmt::Debug>(what: &str, values: &[T]) -> Result<()> {
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value) {
            bail!("Duplicate {} entry: {:?}", what, value);
        }
    }
    Ok(())
}

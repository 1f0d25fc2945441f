//! Settings types. JSON uses camelCase keys; every field has a default so a
//! partial settings file deserializes cleanly.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiftSettings {
    pub chunking: ChunkingSettings,
    pub llm: LlmSettings,
    pub logging: LoggingSettings,
}

impl SiftSettings {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.target_chunk_size == 0 {
            return Err(SettingsError::InvalidValue(
                "chunking.targetChunkSize must be greater than 0".into(),
            ));
        }
        if c.hard_cut_factor < 1 {
            return Err(SettingsError::InvalidValue(
                "chunking.hardCutFactor must be at least 1".into(),
            ));
        }
        if c.summary_budget == 0 {
            return Err(SettingsError::InvalidValue(
                "chunking.summaryBudget must be greater than 0".into(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "llm.timeoutSecs must be greater than 0".into(),
            ));
        }
        if self.llm.idle_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "llm.idleTimeoutSecs must be greater than 0".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(SettingsError::InvalidValue(format!(
                "llm.temperature {} outside 0.0..=2.0",
                self.llm.temperature
            )));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(SettingsError::InvalidValue("llm.baseUrl is empty".into()));
        }
        Ok(())
    }
}

/// When and how content is split.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkingSettings {
    /// Content at or above this many characters is chunked.
    pub activation_threshold: usize,
    /// Preferred chunk size in characters.
    pub target_chunk_size: usize,
    /// A single unit larger than `targetChunkSize * hardCutFactor` is cut.
    pub hard_cut_factor: usize,
    /// Carried summary size that triggers compaction, in characters.
    pub summary_budget: usize,
    /// `false` forces single-shot processing.
    pub enabled: bool,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            activation_threshold: 10_000,
            target_chunk_size: 8_000,
            hard_cut_factor: 4,
            summary_budget: 6_000,
            enabled: true,
        }
    }
}

/// Inference backend settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    /// Per-invocation timeout.
    pub timeout_secs: u64,
    /// Longest silence allowed between streamed response lines.
    pub idle_timeout_secs: u64,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub retry: RetrySettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout_secs: 30,
            idle_timeout_secs: 60,
            temperature: 0.1,
            max_tokens: None,
            retry: RetrySettings::default(),
        }
    }
}

/// Retry and circuit breaker settings for the provider wrapper.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Consecutive failures before the circuit opens.
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

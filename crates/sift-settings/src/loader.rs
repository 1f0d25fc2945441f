//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SiftSettings::default()`]
//! 2. If `~/.sift/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `SIFT_*` environment variable overrides (highest priority)
//! 4. Validate cross-field constraints

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::SiftSettings;

/// Resolve the path to the settings file (`~/.sift/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".sift").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SiftSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SiftSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

/// Same as [`load_settings_from_path`] with an injectable env lookup.
pub fn load_with_env<F>(path: &Path, env: F) -> Result<SiftSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(SiftSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SiftSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `SIFT_*` overrides. Invalid values are ignored with a warning.
pub fn apply_env_overrides<F>(settings: &mut SiftSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let reader = EnvReader { env };

    if let Some(v) = reader.usize("SIFT_ACTIVATION_THRESHOLD", 1, 100_000_000) {
        settings.chunking.activation_threshold = v;
    }
    if let Some(v) = reader.usize("SIFT_CHUNK_SIZE", 100, 10_000_000) {
        settings.chunking.target_chunk_size = v;
    }
    if let Some(v) = reader.bool("SIFT_CHUNKING_ENABLED") {
        settings.chunking.enabled = v;
    }
    if let Some(v) = reader.u64("SIFT_TIMEOUT_SECS", 1, 3600) {
        settings.llm.timeout_secs = v;
    }
    if let Some(v) = reader.u64("SIFT_IDLE_TIMEOUT_SECS", 1, 3600) {
        settings.llm.idle_timeout_secs = v;
    }
    if let Some(v) = reader.string("SIFT_MODEL") {
        settings.llm.model = v;
    }
    if let Some(v) = reader.string("SIFT_BASE_URL") {
        settings.llm.base_url = v;
    }
    if let Some(v) = reader.string("SIFT_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env readers ─────────────────────────────────────────────────────────────

struct EnvReader<F> {
    env: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.env)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.env)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.env)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.env)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"llm": {"model": "a", "timeoutSecs": 30}});
        let source = serde_json::json!({"llm": {"model": "b"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["llm"]["model"], "b");
        assert_eq!(merged["llm"]["timeoutSecs"], 30);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── loading ─────────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_with_env(Path::new("/nonexistent/settings.json"), no_env).unwrap();
        assert_eq!(settings.chunking.activation_threshold, 10_000);
        assert_eq!(settings.llm.model, "llama3.2");
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"chunking": {"targetChunkSize": 4000}, "llm": {"retry": {"maxRetries": 3}}}"#,
        )
        .unwrap();

        let settings = load_with_env(&path, no_env).unwrap();
        assert_eq!(settings.chunking.target_chunk_size, 4000);
        assert_eq!(settings.chunking.activation_threshold, 10_000);
        assert_eq!(settings.llm.retry.max_retries, 3);
        assert_eq!(settings.llm.retry.base_delay_ms, 1000);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_with_env(&path, no_env);
        assert!(matches!(result, Err(SettingsError::Json(_))));
    }

    #[test]
    fn load_rejects_invalid_values_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"chunking": {"targetChunkSize": 0}}"#).unwrap();

        let result = load_with_env(&path, no_env);
        assert!(matches!(result, Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn env_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"llm": {"model": "from-file"}}"#).unwrap();

        let env = env_of(&[
            ("SIFT_MODEL", "from-env"),
            ("SIFT_ACTIVATION_THRESHOLD", "20000"),
            ("SIFT_CHUNKING_ENABLED", "off"),
            ("SIFT_TIMEOUT_SECS", "90"),
            ("SIFT_IDLE_TIMEOUT_SECS", "120"),
        ]);
        let settings = load_with_env(&path, env).unwrap();
        assert_eq!(settings.llm.model, "from-env");
        assert_eq!(settings.chunking.activation_threshold, 20_000);
        assert!(!settings.chunking.enabled);
        assert_eq!(settings.llm.timeout_secs, 90);
        assert_eq!(settings.llm.idle_timeout_secs, 120);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let env = env_of(&[
            ("SIFT_CHUNK_SIZE", "tiny"),
            ("SIFT_TIMEOUT_SECS", "0"),
            ("SIFT_CHUNKING_ENABLED", "maybe"),
            ("SIFT_BASE_URL", ""),
        ]);
        let mut settings = SiftSettings::default();
        apply_env_overrides(&mut settings, env);
        assert_eq!(settings.chunking.target_chunk_size, 8_000);
        assert_eq!(settings.llm.timeout_secs, 30);
        assert!(settings.chunking.enabled);
        assert_eq!(settings.llm.base_url, "http://localhost:11434");
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u64_range("30", 1, 3600), Some(30));
        assert_eq!(parse_u64_range("0", 1, 3600), None);
        assert_eq!(parse_u64_range("-1", 1, 3600), None);
        assert_eq!(parse_usize_range("8000", 100, 10_000), Some(8000));
        assert_eq!(parse_usize_range("99", 100, 10_000), None);
    }
}

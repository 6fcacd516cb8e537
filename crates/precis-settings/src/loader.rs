//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PrecisSettings::default()`]
//! 2. If `~/.precis/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate values the components cannot work with
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{BackendKind, PrecisSettings};

/// Resolve the path to the settings file (`~/.precis/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".precis").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<PrecisSettings> {
    let defaults = serde_json::to_value(PrecisSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: PrecisSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut PrecisSettings) {
    // ── Summarizer ──────────────────────────────────────────────────
    if let Some(v) = read_env_usize("PRECIS_WORD_COUNT_MAX", 1, 1_000_000) {
        settings.summarizer.word_count_max = v;
    }
    if let Some(v) = read_env_u64("PRECIS_MAX_OUTPUT_TOKENS", 1, 65_536) {
        settings.summarizer.max_output_tokens = v as u32;
    }
    if let Some(v) = read_env_usize("PRECIS_MAX_DEPTH", 1, 1_000) {
        settings.summarizer.max_depth = Some(v);
    }

    // ── Rate limit & retry ──────────────────────────────────────────
    if let Some(v) = read_env_usize("PRECIS_CALL_CEILING", 1, 100_000) {
        settings.rate_limit.call_ceiling = v;
    }
    if let Some(v) = read_env_u64("PRECIS_PERIOD_SECS", 1, 86_400) {
        settings.rate_limit.period_secs = v;
    }
    if let Some(v) = read_env_u64("PRECIS_MAX_BACKOFF_SECS", 0, 86_400) {
        settings.retry.max_backoff_secs = v;
    }
    if let Some(v) = read_env_u64("PRECIS_BASE_DELAY_MS", 1, 600_000) {
        settings.retry.base_delay_ms = v;
    }

    // ── Backend ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("PRECIS_BACKEND") {
        match parse_backend_kind(&v) {
            Some(kind) => settings.backend.kind = kind,
            None => tracing::warn!(key = "PRECIS_BACKEND", value = %v, "unknown backend, ignoring"),
        }
    }
    if let Some(v) = read_env_string("PRECIS_VERTEX_PROJECT") {
        settings.backend.vertex.project = v;
    }
    if let Some(v) = read_env_string("PRECIS_VERTEX_LOCATION") {
        settings.backend.vertex.location = v;
    }
    if let Some(v) = read_env_string("PRECIS_VERTEX_MODEL") {
        settings.backend.vertex.model = v;
    }
    if let Some(v) = read_env_string("PRECIS_LOCAL_MODEL") {
        settings.backend.local.model = v;
    }
    if let Some(v) = read_env_string("PRECIS_MODEL_CACHE_DIR") {
        settings.backend.local.cache_dir = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("PRECIS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("PRECIS_LOG_JSON") {
        settings.logging.json = v;
    }
}

/// Reject values that would make a component unusable.
pub fn validate(settings: &PrecisSettings) -> Result<()> {
    if settings.summarizer.word_count_max == 0 {
        return Err(SettingsError::InvalidValue(
            "summarizer.wordCountMax must be greater than 0".into(),
        ));
    }
    if settings.rate_limit.call_ceiling == 0 {
        return Err(SettingsError::InvalidValue(
            "rateLimit.callCeiling must be greater than 0".into(),
        ));
    }
    if settings.rate_limit.period_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "rateLimit.periodSecs must be greater than 0".into(),
        ));
    }
    if !(0.0..=1.0).contains(&settings.retry.jitter_factor) {
        return Err(SettingsError::InvalidValue(format!(
            "retry.jitterFactor must be within 0.0..=1.0, got {}",
            settings.retry.jitter_factor
        )));
    }
    if settings.backend.local.generation.num_beams == 0 {
        return Err(SettingsError::InvalidValue(
            "backend.local.generation.numBeams must be greater than 0".into(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

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

pub fn parse_backend_kind(val: &str) -> Option<BackendKind> {
    match val.to_lowercase().as_str() {
        "vertex" | "remote" => Some(BackendKind::Vertex),
        "local" => Some(BackendKind::Local),
        _ => None,
    }
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({
            "summarizer": {"wordCountMax": 100, "maxOutputTokens": 1024}
        });
        let source = serde_json::json!({
            "summarizer": {"wordCountMax": 250}
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["summarizer"]["wordCountMax"], 250);
        assert_eq!(merged["summarizer"]["maxOutputTokens"], 1024);
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
        let source = serde_json::json!({"items": [4, 5]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let path = Path::new("/nonexistent/settings.json");
        let settings = load_settings_from_path(path).unwrap();
        assert_eq!(settings.rate_limit.call_ceiling, 20);
        assert_eq!(settings.retry.max_backoff_secs, 300);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"rateLimit": {"callCeiling": 5}, "backend": {"kind": "local", "local": {"generation": {"numBeams": 2}}}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.rate_limit.call_ceiling, 5);
        assert_eq!(settings.rate_limit.period_secs, 60);
        assert_eq!(settings.backend.kind, BackendKind::Local);
        assert_eq!(settings.backend.local.generation.num_beams, 2);
        assert_eq!(settings.backend.local.generation.max_length, 150);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_zero_word_budget_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"summarizer": {"wordCountMax": 0}}"#).unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    #[test]
    fn validate_rejects_out_of_range_jitter() {
        let mut settings = PrecisSettings::default();
        settings.retry.jitter_factor = 1.5;
        assert!(validate(&settings).is_err());
        settings.retry.jitter_factor = 0.3;
        assert!(validate(&settings).is_ok());
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "on", "TRUE"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "off", "Off"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("60", 1, 86_400), Some(60));
        assert_eq!(parse_u64_range("0", 1, 86_400), None);
        assert_eq!(parse_u64_range("abc", 1, 86_400), None);
    }

    #[test]
    fn parse_usize_bounds() {
        assert_eq!(parse_usize_range("100", 1, 1_000_000), Some(100));
        assert_eq!(parse_usize_range("0", 1, 1_000_000), None);
    }

    #[test]
    fn parse_backend_kind_aliases() {
        assert_eq!(parse_backend_kind("Vertex"), Some(BackendKind::Vertex));
        assert_eq!(parse_backend_kind("remote"), Some(BackendKind::Vertex));
        assert_eq!(parse_backend_kind("local"), Some(BackendKind::Local));
        assert_eq!(parse_backend_kind("pegasus"), None);
    }
}

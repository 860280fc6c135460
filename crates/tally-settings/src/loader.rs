//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TallySettings::default()`]
//! 2. If `~/.tally/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::TallySettings;

/// Resolve the path to the settings file (`~/.tally/settings.json`).
#[must_use]
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tally").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TallySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<TallySettings> {
    let defaults = serde_json::to_value(TallySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: TallySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
#[must_use]
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
/// Each env var has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are silently ignored (fall back to file/default)
pub fn apply_env_overrides(settings: &mut TallySettings) {
    if let Some(v) = read_env_u64("TALLY_SWEEP_INTERVAL_SECS", 1, 86_400) {
        settings.scheduler.sweep_interval_secs = v;
    }
    if let Some(v) = read_env_usize("TALLY_MAX_CONCURRENT", 1, 64) {
        settings.scheduler.max_concurrent = v;
    }
    if let Some(v) = read_env_u64("TALLY_CALL_TIMEOUT_MS", 1, 600_000) {
        settings.scheduler.call_timeout_ms = v;
    }
    if let Some(v) = read_env_bool("TALLY_PIN_COUNTERS") {
        settings.scheduler.pin_counters = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

fn parse_u64_in_range(raw: &str, min: u64, max: u64) -> Option<u64> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|raw| parse_u64_in_range(&raw, min, max))
}

#[allow(clippy::cast_possible_truncation)]
fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    read_env_u64(name, min as u64, max as u64).map(|v| v as usize)
}

fn read_env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|raw| parse_bool(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn deep_merge_objects_recursively() {
        let target = serde_json::json!({"a": {"x": 1, "y": 2}, "b": 3});
        let source = serde_json::json!({"a": {"y": 9}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"]["x"], 1);
        assert_eq!(merged["a"]["y"], 9);
        assert_eq!(merged["b"], 3);
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let target = serde_json::json!({"mappings": [{"groupId": "g1"}]});
        let source = serde_json::json!({"mappings": []});
        let merged = deep_merge(target, source);
        assert_eq!(merged["mappings"], serde_json::json!([]));
    }

    #[test]
    fn deep_merge_skips_nulls() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null, "b": 2});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings =
            load_settings_from_path(Path::new("/nonexistent/tally/settings.json")).unwrap();
        assert_eq!(settings.scheduler.sweep_interval_secs, 300);
        assert!(settings.mappings.is_empty());
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "mappings": [{{"groupId": "g1", "counterId": "c1"}}],
                "scheduler": {{"maxConcurrent": 2}}
            }}"#
        )
        .unwrap();

        let settings = load_settings_from_path(file.path()).unwrap();
        assert_eq!(settings.mappings.len(), 1);
        assert_eq!(settings.mappings[0].group_id, "g1");
        assert_eq!(settings.scheduler.max_concurrent, 2);
        // Untouched keys keep their defaults
        assert_eq!(settings.scheduler.call_timeout_ms, 10_000);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(load_settings_from_path(file.path()).is_err());
    }

    #[test]
    fn parse_u64_enforces_range() {
        assert_eq!(parse_u64_in_range("60", 1, 86_400), Some(60));
        assert_eq!(parse_u64_in_range("0", 1, 86_400), None);
        assert_eq!(parse_u64_in_range("90000", 1, 86_400), None);
        assert_eq!(parse_u64_in_range("abc", 1, 86_400), None);
        assert_eq!(parse_u64_in_range(" 42 ", 1, 86_400), Some(42));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for raw in ["true", "1", "yes", "ON"] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["false", "0", "no", "Off"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }
}

//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ScribeSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `SCRIBE_*` environment variable overrides (highest priority)
//! 4. Validate ranges
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{LogLevel, ScribeSettings};

/// Resolve the settings file path.
///
/// `SCRIBE_CONFIG` wins; otherwise `~/.scribe/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(explicit) = read_env_string("SCRIBE_CONFIG") {
        return PathBuf::from(explicit);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".scribe").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ScribeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an out-of-range value is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<ScribeSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<ScribeSettings> {
    let defaults = serde_json::to_value(ScribeSettings::default())
        .map_err(|e| SettingsError::parse(path, e))?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content =
            std::fs::read_to_string(path).map_err(|e| SettingsError::read(path, e))?;
        let user: Value =
            serde_json::from_str(&content).map_err(|e| SettingsError::parse(path, e))?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    serde_json::from_value(merged).map_err(|e| SettingsError::parse(path, e))
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

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut ScribeSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Each value is parsed strictly and range-checked; invalid values are
/// logged and ignored so the file/default value stays in effect.
pub fn apply_overrides<F>(settings: &mut ScribeSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("SCRIBE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.parsed("SCRIBE_PORT", |s| parse_range::<u16>(s, 1024, 65535)) {
        settings.server.port = v;
    }

    // ── Scheduler ───────────────────────────────────────────────────
    if let Some(v) = env.parsed("SCRIBE_MAX_CONCURRENT_JOBS", |s| {
        parse_range::<usize>(s, 1, 16)
    }) {
        settings.scheduler.max_concurrent_jobs = v;
    }
    if let Some(v) = env.parsed("SCRIBE_GATE_TIMEOUT_MS", |s| {
        parse_range::<u64>(s, 100, 10_000)
    }) {
        settings.scheduler.gate_timeout_ms = v;
    }
    if let Some(v) = env.parsed("SCRIBE_MEMORY_THRESHOLD", |s| parse_percent(s, 50.0, 95.0)) {
        settings.scheduler.memory_threshold_percent = v;
    }
    if let Some(v) = env.parsed("SCRIBE_CACHE_CAPACITY", |s| {
        parse_range::<usize>(s, 10, 1000)
    }) {
        settings.scheduler.cache_capacity = v;
    }

    // ── Upload ──────────────────────────────────────────────────────
    if let Some(v) = env.parsed("SCRIBE_MAX_FILE_SIZE_BYTES", |s| {
        parse_range::<u64>(s, 1024, u64::MAX)
    }) {
        settings.upload.max_file_size_bytes = v;
    }

    // ── Transcription ───────────────────────────────────────────────
    if let Some(v) = env.string("SCRIBE_TRANSCRIBE_URL") {
        settings.transcription.base_url = v;
    }
    if let Some(v) = env.parsed("SCRIBE_TRANSCRIBE_TIMEOUT_MS", |s| {
        parse_range::<u64>(s, 1000, 3_600_000)
    }) {
        settings.transcription.timeout_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.parsed("SCRIBE_LOG_LEVEL", parse_log_level) {
        settings.logging.level = v;
    }
    if let Some(v) = env.parsed("SCRIBE_LOG_JSON", parse_bool) {
        settings.logging.json = v;
    }
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

/// Parse an integer within an inclusive range.
pub fn parse_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a finite percentage within an inclusive range.
pub fn parse_percent(val: &str, min: f64, max: f64) -> Option<f64> {
    let n: f64 = val.trim().parse().ok()?;
    (n.is_finite() && n >= min && n <= max).then_some(n)
}

/// Parse a log level name.
pub fn parse_log_level(val: &str) -> Option<LogLevel> {
    match val.to_lowercase().as_str() {
        "trace" => Some(LogLevel::Trace),
        "debug" => Some(LogLevel::Debug),
        "info" => Some(LogLevel::Info),
        "warn" | "warning" => Some(LogLevel::Warn),
        "error" | "critical" => Some(LogLevel::Error),
        _ => None,
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = (self.lookup)(name)?;
        let result = parse(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid env var, ignoring");
        }
        result
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

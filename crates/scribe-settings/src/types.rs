//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a partial JSON file only needs the keys it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the scribe service.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScribeSettings {
    /// HTTP bind settings.
    pub server: ServerSettings,
    /// Admission control, cache, and backpressure settings.
    pub scheduler: SchedulerSettings,
    /// Upload validation settings.
    pub upload: UploadSettings,
    /// Transcription sidecar settings.
    pub transcription: TranscriptionSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl ScribeSettings {
    /// Check every bounded value, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.scheduler.validate()?;
        self.upload.validate()?;
        self.transcription.validate()
    }
}

/// HTTP bind settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerSettings {
    fn validate(&self) -> Result<()> {
        check_range("server.port", self.port, 1024, 65535)
    }
}

/// Admission control settings for the job scheduler.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerSettings {
    /// Number of transcription slots in the concurrency gate.
    pub max_concurrent_jobs: usize,
    /// How long a job may wait for a slot before it is rejected as busy.
    pub gate_timeout_ms: u64,
    /// Memory utilization (percent) at or above which jobs are rejected.
    pub memory_threshold_percent: f64,
    /// Maximum number of cached transcripts.
    pub cache_capacity: usize,
    /// Retry hint advertised on backpressure rejections.
    pub retry_after_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            gate_timeout_ms: 1000,
            memory_threshold_percent: 85.0,
            cache_capacity: 100,
            retry_after_secs: 30,
        }
    }
}

impl SchedulerSettings {
    /// Gate acquire timeout as a [`Duration`].
    pub fn gate_timeout(&self) -> Duration {
        Duration::from_millis(self.gate_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        check_range("scheduler.maxConcurrentJobs", self.max_concurrent_jobs, 1, 16)?;
        check_range("scheduler.gateTimeoutMs", self.gate_timeout_ms, 100, 10_000)?;
        check_range("scheduler.cacheCapacity", self.cache_capacity, 10, 1000)?;
        check_range("scheduler.retryAfterSecs", self.retry_after_secs, 1, 3600)?;
        let pct = self.memory_threshold_percent;
        if !(50.0..=95.0).contains(&pct) {
            return Err(SettingsError::out_of_range(
                "scheduler.memoryThresholdPercent",
                format!("must be within 50..=95, got {pct}"),
            ));
        }
        Ok(())
    }
}

/// Upload validation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadSettings {
    /// Largest accepted upload in bytes.
    pub max_file_size_bytes: u64,
    /// Accepted file extensions, lowercase with leading dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 200 * 1024 * 1024,
            allowed_extensions: [
                ".mp3", ".wav", ".m4a", ".flac", ".webm", ".mp4", ".avi", ".mov",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

impl UploadSettings {
    /// Whether `filename` carries an allowed extension (case-insensitive).
    pub fn is_allowed(&self, filename: &str) -> bool {
        extension_of(filename).is_some_and(|ext| {
            self.allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        })
    }

    fn validate(&self) -> Result<()> {
        if self.max_file_size_bytes < 1024 {
            return Err(SettingsError::out_of_range(
                "upload.maxFileSizeBytes",
                format!("must be at least 1024, got {}", self.max_file_size_bytes),
            ));
        }
        if self.allowed_extensions.is_empty() {
            return Err(SettingsError::out_of_range(
                "upload.allowedExtensions",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Lowercased `.ext` suffix of a filename, if it has one.
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

/// Transcription sidecar settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionSettings {
    /// Base URL of the transcription sidecar.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Model identifier forwarded to the sidecar.
    pub model: String,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            timeout_ms: 180_000,
            model: "mlx-community/whisper-large-v3-mlx".to_string(),
        }
    }
}

impl TranscriptionSettings {
    fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(SettingsError::out_of_range(
                "transcription.baseUrl",
                "must not be empty",
            ));
        }
        check_range("transcription.timeoutMs", self.timeout_ms, 1000, 3_600_000)
    }
}

/// Log verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level (most verbose).
    Trace,
    /// Debug-level.
    Debug,
    /// Info-level (default).
    #[default]
    Info,
    /// Warning-level.
    Warn,
    /// Error-level.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

fn check_range<T>(name: &'static str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(SettingsError::out_of_range(
            name,
            format!("must be within {min}..={max}, got {value}"),
        ));
    }
    Ok(())
}

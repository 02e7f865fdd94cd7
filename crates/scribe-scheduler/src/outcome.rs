//! Typed results of a scheduling decision.

use std::fmt;
use std::time::Duration;

/// Why a job was not answered with text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Memory utilization was at or above the threshold, or unknown.
    MemoryPressure,
    /// No processing slot freed up before the gate timeout.
    Busy,
    /// A slot was granted but the transcriber failed.
    TranscriptionFailed,
    /// The caller cancelled while queued for a slot.
    Cancelled,
}

impl RejectReason {
    /// Stable snake_case label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MemoryPressure => "memory_pressure",
            Self::Busy => "busy",
            Self::TranscriptionFailed => "transcription_failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Temporary saturation the caller can retry after a delay.
    pub fn is_backpressure(self) -> bool {
        matches!(self, Self::MemoryPressure | Self::Busy)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `submit` produced for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Answered from the result cache without touching the gate.
    CachedResult(String),
    /// Freshly transcribed.
    Transcribed(String),
    /// Not answered.
    Rejected {
        /// Why.
        reason: RejectReason,
        /// When to retry, for backpressure rejections.
        retry_after: Option<Duration>,
    },
}

impl Outcome {
    /// The transcript, for successful outcomes.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::CachedResult(text) | Self::Transcribed(text) => Some(text),
            Self::Rejected { .. } => None,
        }
    }

    /// Retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Rejected { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// The rejection reason, if rejected.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_for_success() {
        assert_eq!(Outcome::Transcribed("hi".into()).text(), Some("hi"));
        assert_eq!(Outcome::CachedResult("hi".into()).text(), Some("hi"));
        let rejected = Outcome::Rejected {
            reason: RejectReason::Busy,
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(rejected.text(), None);
        assert_eq!(rejected.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(rejected.reject_reason(), Some(RejectReason::Busy));
    }

    #[test]
    fn backpressure_classification() {
        assert!(RejectReason::MemoryPressure.is_backpressure());
        assert!(RejectReason::Busy.is_backpressure());
        assert!(!RejectReason::TranscriptionFailed.is_backpressure());
        assert!(!RejectReason::Cancelled.is_backpressure());
    }

    #[test]
    fn labels_are_snake_case() {
        for r in [
            RejectReason::MemoryPressure,
            RejectReason::Busy,
            RejectReason::TranscriptionFailed,
            RejectReason::Cancelled,
        ] {
            assert!(r.as_str().chars().all(|c| c.is_ascii_lowercase() || c == '_'));
            assert_eq!(r.to_string(), r.as_str());
        }
    }
}

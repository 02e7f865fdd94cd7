//! Transcriber trait and mock implementation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::types::TranscriptionError;

/// Turns raw audio bytes into text.
///
/// Implementations may be slow and may fail; callers treat every failure
/// the same way.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one audio payload.
    async fn transcribe(
        &self,
        audio: Bytes,
        media_type: &str,
        filename: Option<&str>,
    ) -> Result<String, TranscriptionError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Deterministic transcriber for tests.
///
/// Returns `"transcript:<len>:<first byte>"` after an optional delay, and
/// tracks how many calls ran and how many overlapped.
pub struct MockTranscriber {
    delay: Duration,
    fail: AtomicBool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockTranscriber {
    /// Create a mock that answers immediately.
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// Create a mock that sleeps `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Make subsequent calls fail with [`TranscriptionError::Engine`].
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of `transcribe` calls started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls that ever overlapped.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// The text this mock produces for `audio`.
    pub fn expected_text(audio: &[u8]) -> String {
        format!(
            "transcript:{}:{}",
            audio.len(),
            audio.first().copied().unwrap_or_default()
        )
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let _ = self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(
        &self,
        audio: Bytes,
        _media_type: &str,
        _filename: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(TranscriptionError::Engine("mock failure".into()));
        }
        Ok(Self::expected_text(&audio))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn mock_is_deterministic() {
        let mock = MockTranscriber::new();
        let a = mock
            .transcribe(Bytes::from_static(b"abc"), "audio/wav", None)
            .await
            .unwrap();
        let b = mock
            .transcribe(Bytes::from_static(b"abc"), "audio/wav", None)
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "transcript:3:97");
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn mock_failure_switch() {
        let mock = MockTranscriber::new();
        mock.set_failing(true);
        let err = mock
            .transcribe(Bytes::from_static(b"x"), "audio/wav", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::Engine(_)));
        assert_eq!(mock.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_tracks_overlap() {
        let mock = Arc::new(MockTranscriber::with_delay(Duration::from_secs(2)));
        let handles: Vec<_> = (0..3u8)
            .map(|i| {
                let mock = Arc::clone(&mock);
                tokio::spawn(async move {
                    mock.transcribe(Bytes::from(vec![i]), "audio/wav", None)
                        .await
                })
            })
            .collect();
        for h in handles {
            let _ = h.await.unwrap().unwrap();
        }
        assert_eq!(mock.peak_in_flight(), 3);
        assert_eq!(mock.in_flight(), 0);
    }
}

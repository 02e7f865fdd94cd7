//! A single unit of transcription work.

use bytes::Bytes;
use tokio::time::Instant;

/// Audio submitted for transcription.
///
/// Content type and size are validated by the transport before a `Job` is
/// built; the scheduler trusts both.
#[derive(Debug, Clone)]
pub struct Job {
    /// Raw audio bytes.
    pub payload: Bytes,
    /// Declared size of the upload in bytes.
    pub content_length: u64,
    /// Declared media type, e.g. `audio/mpeg`.
    pub media_type: String,
    /// Original filename, when the client sent one.
    pub filename: Option<String>,
    /// When the job arrived. Accepted-job latency is measured from here.
    pub received_at: Instant,
}

impl Job {
    /// Build a job stamped with the current time.
    pub fn new(payload: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        let payload = payload.into();
        Self {
            content_length: payload.len() as u64,
            payload,
            media_type: media_type.into(),
            filename: None,
            received_at: Instant::now(),
        }
    }

    /// Attach the client-supplied filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_payload_length() {
        let job = Job::new(vec![0u8; 10], "audio/wav");
        assert_eq!(job.content_length, 10);
        assert_eq!(job.media_type, "audio/wav");
        assert!(job.filename.is_none());
    }

    #[test]
    fn with_filename_sets_name() {
        let job = Job::new(&b"x"[..], "audio/mpeg").with_filename("talk.mp3");
        assert_eq!(job.filename.as_deref(), Some("talk.mp3"));
    }
}

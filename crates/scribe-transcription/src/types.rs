//! Core types for the transcription boundary.

/// Errors a transcription collaborator can report.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    /// The engine is not reachable or not ready.
    #[error("transcriber unavailable: {0}")]
    Unavailable(String),

    /// Sending the audio to the engine failed.
    #[error("request error: {0}")]
    Request(String),

    /// The engine answered with something other than a transcript.
    #[error("bad response: {0}")]
    BadResponse(String),

    /// The engine ran but could not produce text for the input.
    #[error("engine error: {0}")]
    Engine(String),
}

/// Extension trait to reduce `.map_err()` boilerplate when wrapping errors into `TranscriptionError`.
pub trait ResultExt<T> {
    /// Wrap the error as [`TranscriptionError::Request`] with `context` prefix.
    fn request(self, context: &str) -> Result<T, TranscriptionError>;
    /// Wrap the error as [`TranscriptionError::BadResponse`] with `context` prefix.
    fn bad_response(self, context: &str) -> Result<T, TranscriptionError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn request(self, context: &str) -> Result<T, TranscriptionError> {
        self.map_err(|e| TranscriptionError::Request(format!("{context}: {e}")))
    }
    fn bad_response(self, context: &str) -> Result<T, TranscriptionError> {
        self.map_err(|e| TranscriptionError::BadResponse(format!("{context}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_carries_detail() {
        let e = TranscriptionError::Engine("corrupt header".into());
        assert!(e.to_string().contains("corrupt header"));
        let e = TranscriptionError::Unavailable("connection refused".into());
        assert!(e.to_string().starts_with("transcriber unavailable"));
    }

    #[test]
    fn result_ext_request_context() {
        let err: Result<(), &str> = Err("timed out");
        let mapped = err.request("POST /transcribe");
        assert!(
            matches!(mapped, Err(TranscriptionError::Request(s)) if s == "POST /transcribe: timed out")
        );
    }

    #[test]
    fn result_ext_bad_response_context() {
        let err: Result<(), &str> = Err("missing field `text`");
        let mapped = err.bad_response("decode body");
        assert!(matches!(mapped, Err(TranscriptionError::BadResponse(s)) if s.contains("text")));
    }

    #[test]
    fn result_ext_ok_passthrough() {
        let ok: Result<i32, &str> = Ok(42);
        assert_eq!(ok.request("ctx").unwrap(), 42);
    }
}

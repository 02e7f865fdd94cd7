//! HTTP client for an out-of-process transcription sidecar.
//!
//! The sidecar accepts `POST {base_url}/transcribe` with a multipart `file`
//! part and answers `{"text": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::service::Transcriber;
use crate::types::{ResultExt, TranscriptionError};

#[derive(Debug, Deserialize)]
struct SidecarResponse {
    text: String,
}

/// Transcriber backed by the sidecar HTTP service.
pub struct SidecarTranscriber {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl SidecarTranscriber {
    /// Build a client for `base_url` with a per-request `timeout`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .request("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/transcribe", self.base_url)
    }
}

/// Pick a filename whose extension matches the media type, since decoders
/// sniff the container from it.
fn filename_for_mime(media_type: &str) -> &'static str {
    match media_type {
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => "audio.m4a",
        "audio/mpeg" | "audio/mp3" => "audio.mp3",
        "audio/ogg" => "audio.ogg",
        "audio/webm" | "video/webm" => "audio.webm",
        "audio/flac" | "audio/x-flac" => "audio.flac",
        "video/mp4" => "audio.mp4",
        _ => "audio.wav",
    }
}

#[async_trait]
impl Transcriber for SidecarTranscriber {
    #[instrument(skip_all, fields(bytes = audio.len(), media_type = %media_type))]
    async fn transcribe(
        &self,
        audio: Bytes,
        media_type: &str,
        filename: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        let len = audio.len() as u64;
        let part = reqwest::multipart::Part::stream_with_length(audio, len)
            .file_name(filename.unwrap_or(filename_for_mime(media_type)).to_string())
            .mime_str(media_type)
            .request("multipart part")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    TranscriptionError::Unavailable(e.to_string())
                } else {
                    TranscriptionError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::BadResponse(format!(
                "sidecar returned {status}: {body}"
            )));
        }

        let parsed: SidecarResponse = response.json().await.bad_response("decode body")?;
        debug!(chars = parsed.text.len(), "sidecar transcription complete");
        Ok(parsed.text)
    }

    fn name(&self) -> &'static str {
        "sidecar"
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> SidecarTranscriber {
        SidecarTranscriber::new(server.uri(), "test-model", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn filename_follows_mime() {
        assert_eq!(filename_for_mime("audio/mpeg"), "audio.mp3");
        assert_eq!(filename_for_mime("audio/x-m4a"), "audio.m4a");
        assert_eq!(filename_for_mime("application/octet-stream"), "audio.wav");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let t = SidecarTranscriber::new("http://host:1/", "m", Duration::from_secs(1)).unwrap();
        assert_eq!(t.endpoint(), "http://host:1/transcribe");
    }

    #[tokio::test]
    async fn returns_text_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transcribe"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "hello"})),
            )
            .mount(&server)
            .await;

        let text = client_for(&server)
            .transcribe(Bytes::from_static(b"RIFF"), "audio/wav", Some("a.wav"))
            .await
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn non_success_status_is_bad_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transcribe"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .transcribe(Bytes::from_static(b"RIFF"), "audio/wav", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::BadResponse(s) if s.contains("boom")));
    }

    #[tokio::test]
    async fn malformed_body_is_bad_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .transcribe(Bytes::from_static(b"RIFF"), "audio/wav", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::BadResponse(_)));
    }
}

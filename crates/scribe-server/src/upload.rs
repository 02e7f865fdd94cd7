//! Multipart upload extraction and validation.

use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use bytes::BytesMut;
use scribe_scheduler::Job;
use scribe_settings::UploadSettings;

/// Multipart field carrying the audio.
pub const FILE_FIELD: &str = "file";

const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Why an upload never reached the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum UploadRejection {
    /// No `file` part in the form.
    #[error("multipart field `file` is required")]
    MissingFile,

    /// The filename's extension is not allowed.
    #[error("unsupported file type {0:?}")]
    UnsupportedExtension(String),

    /// The file exceeded the size limit.
    #[error("file exceeds the {limit} byte limit")]
    TooLarge {
        /// Configured limit in bytes.
        limit: u64,
    },

    /// The body was not valid multipart.
    #[error("malformed multipart body: {0}")]
    Malformed(String),
}

impl UploadRejection {
    /// Response status.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedExtension(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Label for the rejected-jobs counter.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::MissingFile => "missing_file",
            Self::UnsupportedExtension(_) => "unsupported_media_type",
            Self::TooLarge { .. } => "payload_too_large",
            Self::Malformed(_) => "malformed_upload",
        }
    }

    fn from_multipart(err: &MultipartError, limit: u64) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::TooLarge { limit }
        } else {
            Self::Malformed(err.body_text())
        }
    }
}

/// Pull the `file` part out of `multipart` and turn it into a [`Job`].
///
/// The extension is checked before any bytes are read; the size limit is
/// enforced while streaming, so an oversized upload is never fully buffered.
pub async fn read_upload(
    multipart: &mut Multipart,
    rules: &UploadSettings,
) -> Result<Job, UploadRejection> {
    let limit = rules.max_file_size_bytes;
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| UploadRejection::from_multipart(&e, limit))?
            .ok_or(UploadRejection::MissingFile)?;
        if field.name() == Some(FILE_FIELD) {
            return read_file_field(field, rules).await;
        }
    }
}

async fn read_file_field(
    mut field: Field<'_>,
    rules: &UploadSettings,
) -> Result<Job, UploadRejection> {
    let limit = rules.max_file_size_bytes;
    let filename = field.file_name().unwrap_or_default().to_string();
    if !rules.is_allowed(&filename) {
        return Err(UploadRejection::UnsupportedExtension(filename));
    }
    let media_type = field
        .content_type()
        .unwrap_or(DEFAULT_MEDIA_TYPE)
        .to_string();

    let mut buf = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| UploadRejection::from_multipart(&e, limit))?
    {
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(UploadRejection::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Job::new(buf.freeze(), media_type).with_filename(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(UploadRejection::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            UploadRejection::UnsupportedExtension("a.txt".into()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            UploadRejection::TooLarge { limit: 10 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn messages_carry_detail() {
        let e = UploadRejection::UnsupportedExtension("notes.txt".into());
        assert!(e.to_string().contains("notes.txt"));
        let e = UploadRejection::TooLarge { limit: 1024 };
        assert!(e.to_string().contains("1024"));
    }
}

//! Server configuration.

use scribe_settings::{ScribeSettings, UploadSettings};
use serde::{Deserialize, Serialize};

/// Configuration for the HTTP server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Upload validation rules.
    pub upload: UploadSettings,
}

impl ServerConfig {
    /// Take the server and upload sections of the loaded settings.
    pub fn from_settings(settings: &ScribeSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            upload: settings.upload.clone(),
        }
    }

    /// Request body ceiling: the file limit plus room for multipart framing.
    pub fn body_limit(&self) -> usize {
        const MULTIPART_OVERHEAD: u64 = 64 * 1024;
        usize::try_from(self.upload.max_file_size_bytes.saturating_add(MULTIPART_OVERHEAD))
            .unwrap_or(usize::MAX)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&ScribeSettings::default())
    }
}

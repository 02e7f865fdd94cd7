//! # scribe-settings
//!
//! Configuration for the scribe transcription service.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** - [`ScribeSettings::default()`]
//! 2. **Settings file** - `$SCRIBE_CONFIG` or `~/.scribe/settings.json`
//! 3. **Environment variables** - `SCRIBE_*` overrides (highest priority)
//!
//! The loaded value is owned by the binary and handed to each component at
//! startup; there is no process-wide settings singleton.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;

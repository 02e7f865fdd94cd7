//! # scribe-transcription
//!
//! The boundary between the scheduler and whatever actually turns audio into
//! text. The scheduler only sees [`Transcriber`]; this crate ships a
//! deterministic [`MockTranscriber`] and an HTTP [`SidecarTranscriber`].
//!
//! ## Crate Position
//!
//! Standalone (no scribe crate dependencies).
//! Depended on by: scribe-scheduler, scribe.

#![deny(unsafe_code)]

pub mod service;
pub mod sidecar;
pub mod types;

pub use service::{MockTranscriber, Transcriber};
pub use sidecar::SidecarTranscriber;
pub use types::{ResultExt, TranscriptionError};

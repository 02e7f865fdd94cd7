//! # scribe-server
//!
//! Axum HTTP transport for the scribe scheduler.
//!
//! - `POST /v1/transcribe`: multipart upload (`file` field), validated here
//!   and handed to the scheduler
//! - `GET /health`: memory utilization and busy slots
//! - `GET /metrics`: outcome and cache counters as JSON
//! - `GET /metrics/prometheus`: Prometheus text exposition
//!
//! ## Crate Position
//!
//! Depends on: scribe-settings, scribe-scheduler.
//! Depended on by: scribe.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod upload;

pub use config::ServerConfig;
pub use error::{ApiError, ErrorBody};
pub use server::{AppState, MetricsResponse, ScribeServer, TranscribeResponse};
pub use shutdown::ShutdownSignal;

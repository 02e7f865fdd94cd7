//! `ScribeServer`: Axum HTTP front end for the scheduler.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use scribe_scheduler::{CacheStats, MetricsSnapshot, Outcome, Scheduler};
use serde::Serialize;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownSignal;
use crate::upload::read_upload;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The job scheduler.
    pub scheduler: Arc<Scheduler>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Stop signal for the listener and queued jobs.
    pub shutdown: Arc<ShutdownSignal>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

/// Successful transcription body.
#[derive(Debug, Clone, Serialize)]
pub struct TranscribeResponse {
    /// The transcript.
    pub text: String,
    /// Whether it came from the result cache.
    pub cached: bool,
}

/// `GET /metrics` body: outcome counters at the top level, cache counters
/// nested under `cache`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    /// Per-outcome request counters.
    #[serde(flatten)]
    pub requests: MetricsSnapshot,
    /// Result cache counters.
    pub cache: CacheStats,
}

/// The scribe HTTP server.
pub struct ScribeServer {
    config: Arc<ServerConfig>,
    scheduler: Arc<Scheduler>,
    shutdown: Arc<ShutdownSignal>,
    prometheus: Option<PrometheusHandle>,
    start_time: Instant,
}

impl ScribeServer {
    /// Create a server in front of `scheduler`.
    pub fn new(config: ServerConfig, scheduler: Arc<Scheduler>) -> Self {
        Self {
            config: Arc::new(config),
            scheduler,
            shutdown: Arc::new(ShutdownSignal::new()),
            prometheus: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics/prometheus` from `handle`.
    #[must_use]
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            scheduler: Arc::clone(&self.scheduler),
            config: Arc::clone(&self.config),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            prometheus: self.prometheus.clone(),
        };

        Router::new()
            .route(
                "/v1/transcribe",
                post(transcribe_handler).layer(DefaultBodyLimit::max(self.config.body_limit())),
            )
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/metrics/prometheus", get(prometheus_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind and serve in the background until the shutdown token fires.
    ///
    /// Returns the bound address and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server stopped with error");
            }
        });

        info!(%local_addr, "scribe server listening");
        Ok((local_addr, handle))
    }

    /// The stop signal shared by the listener and queued jobs.
    pub fn shutdown(&self) -> &Arc<ShutdownSignal> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// POST /v1/transcribe
async fn transcribe_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscribeResponse>, ApiError> {
    // Refuse before buffering the body so a memory-pressure 503 wins over
    // any verdict on the upload itself.
    if let Err(refused) = state.scheduler.admit() {
        return respond(refused);
    }

    let job = match read_upload(&mut multipart, &state.config.upload).await {
        Ok(job) => job,
        Err(rejection) => {
            warn!(error = %rejection, "upload rejected");
            state
                .scheduler
                .metrics()
                .record_rejected(rejection.metric_label());
            return Err(rejection.into());
        }
    };

    let cancel = state.shutdown.token();
    respond(state.scheduler.submit_cancellable(job, &cancel).await)
}

fn respond(outcome: Outcome) -> Result<Json<TranscribeResponse>, ApiError> {
    match outcome {
        Outcome::CachedResult(text) => Ok(Json(TranscribeResponse { text, cached: true })),
        Outcome::Transcribed(text) => Ok(Json(TranscribeResponse {
            text,
            cached: false,
        })),
        Outcome::Rejected {
            reason,
            retry_after,
        } => Err(ApiError::from_rejection(reason, retry_after)),
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let view = state.scheduler.health();
    Json(health::health_check(state.start_time, &view))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        requests: state.scheduler.metrics().snapshot(),
        cache: state.scheduler.cache().stats(),
    })
}

/// GET /metrics/prometheus
async fn prometheus_handler(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => ApiError::new(StatusCode::NOT_FOUND, "prometheus exporter not installed")
            .into_response(),
    }
}

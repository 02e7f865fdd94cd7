//! The job scheduler: admission, deduplication, bounded execution, accounting.

use std::sync::Arc;
use std::time::Duration;

use scribe_settings::SchedulerSettings;
use scribe_transcription::Transcriber;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::cache::ResultCache;
use crate::fingerprint::Fingerprint;
use crate::gate::{Acquire, ConcurrencyGate, GatePermit};
use crate::job::Job;
use crate::metrics::MetricsAggregator;
use crate::monitor::{MemoryUtilization, ResourceMonitor};
use crate::outcome::{Outcome, RejectReason};

/// Admission parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Reject new work at or above this memory utilization.
    pub memory_threshold_percent: f64,
    /// How long a job may queue for a slot.
    pub gate_timeout: Duration,
    /// Retry hint attached to backpressure rejections.
    pub retry_after: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            memory_threshold_percent: 85.0,
            gate_timeout: Duration::from_secs(1),
            retry_after: Duration::from_secs(30),
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(s: &SchedulerSettings) -> Self {
        Self {
            memory_threshold_percent: s.memory_threshold_percent,
            gate_timeout: s.gate_timeout(),
            retry_after: Duration::from_secs(s.retry_after_secs),
        }
    }
}

/// Read-only view for health polling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthView {
    /// Latest memory sample.
    pub memory: MemoryUtilization,
    /// Jobs currently inside the gate.
    pub active_jobs: usize,
}

/// Decides, for every job, whether to reject it, answer it from the cache,
/// or run it through the transcriber under the concurrency gate.
pub struct Scheduler {
    config: SchedulerConfig,
    monitor: Arc<dyn ResourceMonitor>,
    gate: Arc<ConcurrencyGate>,
    cache: Arc<ResultCache>,
    metrics: Arc<MetricsAggregator>,
    transcriber: Arc<dyn Transcriber>,
}

impl Scheduler {
    /// Assemble a scheduler from already-built components.
    pub fn new(
        config: SchedulerConfig,
        monitor: Arc<dyn ResourceMonitor>,
        gate: Arc<ConcurrencyGate>,
        cache: Arc<ResultCache>,
        metrics: Arc<MetricsAggregator>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        Self {
            config,
            monitor,
            gate,
            cache,
            metrics,
            transcriber,
        }
    }

    /// Build the gate, cache and metrics from settings.
    pub fn from_settings(
        settings: &SchedulerSettings,
        monitor: Arc<dyn ResourceMonitor>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        info!(
            max_concurrent_jobs = settings.max_concurrent_jobs,
            cache_capacity = settings.cache_capacity,
            memory_threshold = settings.memory_threshold_percent,
            transcriber = transcriber.name(),
            "scheduler configured"
        );
        Self::new(
            SchedulerConfig::from(settings),
            monitor,
            Arc::new(ConcurrencyGate::new(settings.max_concurrent_jobs)),
            Arc::new(ResultCache::new(settings.cache_capacity)),
            Arc::new(MetricsAggregator::new()),
            transcriber,
        )
    }

    /// Admission parameters.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The concurrency gate.
    pub fn gate(&self) -> &Arc<ConcurrencyGate> {
        &self.gate
    }

    /// The result cache.
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// The metrics aggregator.
    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    /// Fresh memory sample plus current gate occupancy.
    pub fn health(&self) -> HealthView {
        HealthView {
            memory: self.monitor.memory_utilization(),
            active_jobs: self.gate.active(),
        }
    }

    /// Memory admission on its own, for callers that want to refuse work
    /// before paying to buffer the payload.
    ///
    /// A refusal is counted as a rejected request, so the caller must not
    /// go on to [`submit`](Self::submit) the same job. `submit` repeats this
    /// check because memory can climb while a body is being read.
    pub fn admit(&self) -> Result<(), Outcome> {
        let memory = self.monitor.memory_utilization();
        if memory.exceeds(self.config.memory_threshold_percent) {
            warn!(
                memory_percent = memory.percent(),
                threshold = self.config.memory_threshold_percent,
                "rejecting job under memory pressure"
            );
            return Err(self.reject(RejectReason::MemoryPressure));
        }
        Ok(())
    }

    /// Schedule `job` and wait for its outcome.
    pub async fn submit(&self, job: Job) -> Outcome {
        self.submit_cancellable(job, &CancellationToken::new()).await
    }

    /// Schedule `job`; if `cancel` fires while the job is still queued for a
    /// slot, it is rejected as [`RejectReason::Cancelled`].
    ///
    /// Once a slot is granted the transcription and its cleanup run on their
    /// own task, so they finish even if this future is dropped.
    #[instrument(
        skip_all,
        fields(bytes = job.payload.len(), media_type = %job.media_type, fingerprint = tracing::field::Empty)
    )]
    pub async fn submit_cancellable(&self, job: Job, cancel: &CancellationToken) -> Outcome {
        if let Err(rejected) = self.admit() {
            return rejected;
        }

        let fingerprint = Fingerprint::of(&job.payload);
        let _ = tracing::Span::current().record("fingerprint", fingerprint.short().as_str());

        if let Some(text) = self.cache.lookup(&fingerprint) {
            debug!("cache hit");
            self.metrics.record_cache_hit();
            return Outcome::CachedResult(text);
        }

        let permit = match self
            .gate
            .acquire_cancellable(self.config.gate_timeout, cancel)
            .await
        {
            Acquire::Granted(permit) => permit,
            Acquire::TimedOut => {
                warn!(
                    active = self.gate.active(),
                    timeout_ms = self.config.gate_timeout.as_millis() as u64,
                    "no processing slot available"
                );
                return self.reject(RejectReason::Busy);
            }
            Acquire::Cancelled => {
                info!("job cancelled while queued");
                return self.reject(RejectReason::Cancelled);
            }
        };

        let run = GrantedRun {
            permit,
            fingerprint,
            cache: Arc::clone(&self.cache),
            transcriber: Arc::clone(&self.transcriber),
            completion: Completion::new(Arc::clone(&self.metrics)),
        };
        let task = tokio::spawn(run.execute(job).in_current_span());

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                // The task's completion guard already counted the rejection.
                error!(error = %e, "transcription task aborted");
                Outcome::Rejected {
                    reason: RejectReason::TranscriptionFailed,
                    retry_after: None,
                }
            }
        }
    }

    fn reject(&self, reason: RejectReason) -> Outcome {
        self.metrics.record_rejected(reason.as_str());
        let retry_after = reason.is_backpressure().then_some(self.config.retry_after);
        Outcome::Rejected {
            reason,
            retry_after,
        }
    }
}

/// Work that already holds a slot.
struct GrantedRun {
    permit: GatePermit,
    fingerprint: Fingerprint,
    cache: Arc<ResultCache>,
    transcriber: Arc<dyn Transcriber>,
    completion: Completion,
}

impl GrantedRun {
    async fn execute(self, job: Job) -> Outcome {
        let Self {
            permit,
            fingerprint,
            cache,
            transcriber,
            completion,
        } = self;

        let result = transcriber
            .transcribe(job.payload, &job.media_type, job.filename.as_deref())
            .await;

        match result {
            Ok(text) => {
                let _ = cache.insert(fingerprint, text.clone());
                permit.release();
                let elapsed = job.received_at.elapsed();
                debug!(elapsed_ms = elapsed.as_millis() as u64, "transcribed");
                completion.accepted(elapsed);
                Outcome::Transcribed(text)
            }
            Err(e) => {
                permit.release();
                error!(error = %e, transcriber = transcriber.name(), "transcription failed");
                completion.rejected(RejectReason::TranscriptionFailed);
                Outcome::Rejected {
                    reason: RejectReason::TranscriptionFailed,
                    retry_after: None,
                }
            }
        }
    }
}

/// Records exactly one terminal outcome for a granted job. If dropped before
/// either method runs (the transcriber panicked) it counts a failure.
struct Completion {
    metrics: Option<Arc<MetricsAggregator>>,
}

impl Completion {
    fn new(metrics: Arc<MetricsAggregator>) -> Self {
        Self {
            metrics: Some(metrics),
        }
    }

    fn accepted(mut self, elapsed: Duration) {
        if let Some(m) = self.metrics.take() {
            m.record_accepted(elapsed);
        }
    }

    fn rejected(mut self, reason: RejectReason) {
        if let Some(m) = self.metrics.take() {
            m.record_rejected(reason.as_str());
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(m) = self.metrics.take() {
            m.record_rejected(RejectReason::TranscriptionFailed.as_str());
        }
    }
}

//! Outcome accounting.
//!
//! [`MetricsAggregator`] keeps the counters served by `/metrics` and mirrors
//! each update into the `metrics` facade for Prometheus export.

use std::time::Duration;

use metrics::{counter, histogram};
use parking_lot::Mutex;
use serde::Serialize;

// Metric name constants to avoid typos across crates.

/// Jobs that reached a terminal outcome (counter, labels: outcome, reason).
pub const JOBS_TOTAL: &str = "scribe_jobs_total";
/// Accepted-job latency from arrival (histogram).
pub const JOB_DURATION_SECONDS: &str = "scribe_job_duration_seconds";
/// Jobs answered from the result cache (counter).
pub const CACHE_HITS_TOTAL: &str = "scribe_cache_hits_total";
/// Transcripts pushed out of the result cache (counter).
pub const CACHE_EVICTIONS_TOTAL: &str = "scribe_cache_evictions_total";
/// Transcripts currently held by the result cache (gauge).
pub const CACHE_ENTRIES: &str = "scribe_cache_entries";
/// Slots currently held at the concurrency gate (gauge).
pub const GATE_ACTIVE: &str = "scribe_gate_active";

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    accepted: u64,
    rejected: u64,
    cumulative: Duration,
    cache_hits: u64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Jobs seen.
    pub total_requests: u64,
    /// Jobs answered with text, cache hits included.
    pub accepted_requests: u64,
    /// Jobs refused or failed.
    pub rejected_requests: u64,
    /// Mean accepted-job latency in milliseconds; zero before any completes.
    pub avg_processing_time_ms: f64,
    /// Accepted jobs that were cache hits.
    pub cache_hits: u64,
}

/// Process-wide outcome counters.
///
/// All fields sit behind one lock, so a snapshot never shows `total` bumped
/// without its accepted or rejected bucket.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    counters: Mutex<Counters>,
}

impl MetricsAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an accepted job that took `elapsed`.
    pub fn record_accepted(&self, elapsed: Duration) {
        {
            let mut c = self.counters.lock();
            c.total += 1;
            c.accepted += 1;
            c.cumulative += elapsed;
        }
        counter!(JOBS_TOTAL, "outcome" => "accepted").increment(1);
        histogram!(JOB_DURATION_SECONDS).record(elapsed.as_secs_f64());
    }

    /// Count a rejected job. `reason` becomes a metric label.
    pub fn record_rejected(&self, reason: &'static str) {
        {
            let mut c = self.counters.lock();
            c.total += 1;
            c.rejected += 1;
        }
        counter!(JOBS_TOTAL, "outcome" => "rejected", "reason" => reason).increment(1);
    }

    /// Count an accepted job answered from the cache.
    pub fn record_cache_hit(&self) {
        {
            let mut c = self.counters.lock();
            c.total += 1;
            c.accepted += 1;
            c.cache_hits += 1;
        }
        counter!(JOBS_TOTAL, "outcome" => "accepted").increment(1);
        counter!(CACHE_HITS_TOTAL).increment(1);
        histogram!(JOB_DURATION_SECONDS).record(0.0);
    }

    /// Current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = self.counters.lock();
        let avg_processing_time_ms = if c.accepted == 0 {
            0.0
        } else {
            c.cumulative.as_secs_f64() * 1000.0 / c.accepted as f64
        };
        MetricsSnapshot {
            total_requests: c.total,
            accepted_requests: c.accepted,
            rejected_requests: c.rejected,
            avg_processing_time_ms,
            cache_hits: c.cache_hits,
        }
    }
}

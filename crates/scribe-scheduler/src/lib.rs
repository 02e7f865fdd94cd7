//! # scribe-scheduler
//!
//! Admission-controlled, deduplicating job scheduler for transcription work.
//!
//! For every [`Job`] the [`Scheduler`] checks memory pressure through a
//! [`ResourceMonitor`], looks the payload's [`Fingerprint`] up in the
//! [`ResultCache`], and only on a miss queues for a slot at the
//! [`ConcurrencyGate`] before calling the transcriber. Every terminal
//! outcome is counted once by the [`MetricsAggregator`].
//!
//! All shared state is built once at startup and handed to the scheduler
//! by `Arc`; there are no process-wide singletons.
//!
//! ## Crate Position
//!
//! Depends on: scribe-settings, scribe-transcription.
//! Depended on by: scribe-server, scribe.

#![deny(unsafe_code)]

pub mod cache;
pub mod fingerprint;
pub mod gate;
pub mod job;
pub mod metrics;
pub mod monitor;
pub mod outcome;
pub mod scheduler;

pub use cache::{CacheStats, ResultCache};
pub use fingerprint::Fingerprint;
pub use gate::{Acquire, ConcurrencyGate, GatePermit};
pub use job::Job;
pub use self::metrics::{MetricsAggregator, MetricsSnapshot};
pub use monitor::{
    FixedResourceMonitor, MemoryUtilization, ResourceMonitor, SystemResourceMonitor,
};
pub use outcome::{Outcome, RejectReason};
pub use scheduler::{HealthView, Scheduler, SchedulerConfig};

//! Stop signal shared by the listener and jobs waiting at the gate.
//!
//! Triggering the signal does three things. The axum listener stops
//! accepting connections and finishes the requests it already holds.
//! Requests still queued for a gate slot get `503 cancelled`. Transcriptions
//! that already hold a slot run as detached tasks and are not awaited here;
//! their results still land in the cache if the process lives long enough.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Grace period for the listener to finish open requests.
pub const LISTENER_GRACE: Duration = Duration::from_secs(30);

/// One-shot stop signal for a running [`ScribeServer`](crate::ScribeServer).
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// An untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token handed to the listener and to every `submit_cancellable` call.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the signal. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Whether [`trigger`](Self::trigger) has run.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the signal and wait for the serve task to return.
    ///
    /// Returns `false` when `grace` elapses first, in which case the serve
    /// task is aborted along with any connection it still owns.
    pub async fn stop_listener(&self, serve: JoinHandle<()>, grace: Duration) -> bool {
        self.trigger();
        info!(grace_secs = grace.as_secs(), "stopping listener");

        let abort = serve.abort_handle();
        match tokio::time::timeout(grace, serve).await {
            Ok(_) => true,
            Err(_) => {
                warn!(?grace, "listener did not stop in time, aborting");
                abort.abort();
                false
            }
        }
    }
}

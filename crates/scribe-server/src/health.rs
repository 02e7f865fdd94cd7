//! `/health` endpoint.

use std::time::Instant;

use scribe_scheduler::HealthView;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Current memory utilization, `null` when it could not be sampled.
    pub memory_percent: Option<f64>,
    /// Jobs currently holding a processing slot.
    pub active_tasks: usize,
    /// Seconds since the server started.
    pub uptime_secs: u64,
}

/// Build a health response from the scheduler's view.
pub fn health_check(start_time: Instant, view: &HealthView) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        memory_percent: view.memory.percent(),
        active_tasks: view.active_jobs,
        uptime_secs: start_time.elapsed().as_secs(),
    }
}

#[cfg(test)]
mod tests {
    use scribe_scheduler::MemoryUtilization;

    use super::*;

    fn view(memory: MemoryUtilization, active_jobs: usize) -> HealthView {
        HealthView {
            memory,
            active_jobs,
        }
    }

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), &view(MemoryUtilization::Percent(12.0), 0));
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, &view(MemoryUtilization::Percent(1.0), 0));
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn unknown_memory_serializes_as_null() {
        let resp = health_check(Instant::now(), &view(MemoryUtilization::Unknown, 3));
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json["memory_percent"].is_null());
        assert_eq!(json["active_tasks"], 3);
    }
}

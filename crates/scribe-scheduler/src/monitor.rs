//! Memory-pressure sampling.

use parking_lot::Mutex;
use sysinfo::System;

/// One memory sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemoryUtilization {
    /// Used memory as a percentage of total, `0.0..=100.0`.
    Percent(f64),
    /// The sample could not be taken. Treated as over any threshold.
    Unknown,
}

impl MemoryUtilization {
    /// Compute utilization from byte totals.
    pub fn from_totals(total: u64, available: u64) -> Self {
        if total == 0 {
            return Self::Unknown;
        }
        let used = total.saturating_sub(available);
        let percent = used as f64 / total as f64 * 100.0;
        if percent.is_finite() {
            Self::Percent(percent.clamp(0.0, 100.0))
        } else {
            Self::Unknown
        }
    }

    /// The percentage, if known.
    pub fn percent(self) -> Option<f64> {
        match self {
            Self::Percent(p) => Some(p),
            Self::Unknown => None,
        }
    }

    /// Whether admission should be refused at `threshold` percent.
    ///
    /// An unknown sample always exceeds the threshold.
    pub fn exceeds(self, threshold: f64) -> bool {
        match self {
            Self::Percent(p) => p >= threshold,
            Self::Unknown => true,
        }
    }
}

/// Samples current memory utilization.
///
/// Every call takes a fresh reading; implementations must not cache.
pub trait ResourceMonitor: Send + Sync {
    /// Current utilization.
    fn memory_utilization(&self) -> MemoryUtilization;
}

/// Host memory via `sysinfo`.
pub struct SystemResourceMonitor {
    system: Mutex<System>,
}

impl SystemResourceMonitor {
    /// Create a monitor. No sample is taken until the first call.
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceMonitor for SystemResourceMonitor {
    fn memory_utilization(&self) -> MemoryUtilization {
        let mut system = self.system.lock();
        system.refresh_memory();
        MemoryUtilization::from_totals(system.total_memory(), system.available_memory())
    }
}

/// Monitor that reports whatever it was last set to.
pub struct FixedResourceMonitor {
    value: Mutex<MemoryUtilization>,
}

impl FixedResourceMonitor {
    /// Report `percent` until changed.
    pub fn new(percent: f64) -> Self {
        Self {
            value: Mutex::new(MemoryUtilization::Percent(percent)),
        }
    }

    /// Report [`MemoryUtilization::Unknown`] until changed.
    pub fn unknown() -> Self {
        Self {
            value: Mutex::new(MemoryUtilization::Unknown),
        }
    }

    /// Change the reported value.
    pub fn set(&self, value: MemoryUtilization) {
        *self.value.lock() = value;
    }
}

impl ResourceMonitor for FixedResourceMonitor {
    fn memory_utilization(&self) -> MemoryUtilization {
        *self.value.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_totals_computes_used_share() {
        assert_eq!(
            MemoryUtilization::from_totals(1000, 250),
            MemoryUtilization::Percent(75.0)
        );
    }

    #[test]
    fn zero_total_is_unknown() {
        assert_eq!(MemoryUtilization::from_totals(0, 0), MemoryUtilization::Unknown);
    }

    #[test]
    fn available_above_total_clamps_to_zero() {
        assert_eq!(
            MemoryUtilization::from_totals(100, 200),
            MemoryUtilization::Percent(0.0)
        );
    }

    #[test]
    fn threshold_is_inclusive() {
        assert!(MemoryUtilization::Percent(85.0).exceeds(85.0));
        assert!(!MemoryUtilization::Percent(84.9).exceeds(85.0));
    }

    #[test]
    fn unknown_always_exceeds() {
        assert!(MemoryUtilization::Unknown.exceeds(100.0));
        assert_eq!(MemoryUtilization::Unknown.percent(), None);
    }

    #[test]
    fn fixed_monitor_can_change() {
        let m = FixedResourceMonitor::new(10.0);
        assert_eq!(m.memory_utilization().percent(), Some(10.0));
        m.set(MemoryUtilization::Unknown);
        assert_eq!(m.memory_utilization(), MemoryUtilization::Unknown);
    }

    #[test]
    fn system_monitor_reports_a_sample() {
        let m = SystemResourceMonitor::new();
        match m.memory_utilization() {
            MemoryUtilization::Percent(p) => assert!((0.0..=100.0).contains(&p)),
            MemoryUtilization::Unknown => {}
        }
    }
}

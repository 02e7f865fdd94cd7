//! Bounded admission gate in front of the transcriber.
//!
//! Backed by a tokio [`Semaphore`], whose waiters are served in FIFO order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::gauge;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::metrics::GATE_ACTIVE;

#[derive(Debug, Default)]
struct GateCounters {
    granted: AtomicU64,
    released: AtomicU64,
}

/// Result of a cancellable acquire.
#[derive(Debug)]
pub enum Acquire {
    /// A slot was granted.
    Granted(GatePermit),
    /// No slot freed up within the timeout.
    TimedOut,
    /// The caller gave up while queued.
    Cancelled,
}

/// Counting gate with `capacity` slots.
#[derive(Debug)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    counters: Arc<GateCounters>,
}

impl ConcurrencyGate {
    /// Create a gate. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            counters: Arc::new(GateCounters::default()),
        }
    }

    /// Wait up to `timeout` for a slot. `None` means timed out; capacity is
    /// unchanged in that case.
    pub async fn acquire(&self, timeout: Duration) -> Option<GatePermit> {
        match tokio::time::timeout(timeout, Arc::clone(&self.semaphore).acquire_owned()).await {
            Ok(Ok(permit)) => Some(self.grant(permit)),
            // The semaphore is never closed.
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up as soon as `cancel`
    /// fires. A cancelled waiter is never granted a slot.
    pub async fn acquire_cancellable(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Acquire {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Acquire::Cancelled,
            permit = self.acquire(timeout) => match permit {
                Some(permit) => Acquire::Granted(permit),
                None => Acquire::TimedOut,
            },
        }
    }

    fn grant(&self, permit: OwnedSemaphorePermit) -> GatePermit {
        let _ = self.counters.granted.fetch_add(1, Ordering::SeqCst);
        gauge!(GATE_ACTIVE).increment(1.0);
        GatePermit {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        }
    }

    /// Configured number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn active(&self) -> usize {
        self.capacity
            .saturating_sub(self.semaphore.available_permits())
    }

    /// Permits granted since creation.
    pub fn granted(&self) -> u64 {
        self.counters.granted.load(Ordering::SeqCst)
    }

    /// Permits released since creation.
    pub fn released(&self) -> u64 {
        self.counters.released.load(Ordering::SeqCst)
    }
}

/// One held slot. Dropping it returns the slot to the gate.
#[derive(Debug)]
#[must_use = "dropping a permit releases the slot immediately"]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<GateCounters>,
}

impl GatePermit {
    /// Return the slot. Consumes the permit, so it can only happen once.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let _ = self.counters.released.fetch_add(1, Ordering::SeqCst);
        gauge!(GATE_ACTIVE).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grants_up_to_capacity() {
        let gate = ConcurrencyGate::new(2);
        let a = gate.acquire(Duration::from_millis(10)).await;
        let b = gate.acquire(Duration::from_millis(10)).await;
        assert!(a.is_some() && b.is_some());
        assert_eq!(gate.active(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_full_without_side_effects() {
        let gate = ConcurrencyGate::new(1);
        let held = gate.acquire(Duration::from_secs(1)).await.unwrap();
        assert!(gate.acquire(Duration::from_secs(1)).await.is_none());
        assert_eq!(gate.active(), 1);
        assert_eq!(gate.granted(), 1);
        held.release();
        assert_eq!(gate.active(), 0);
    }

    #[tokio::test]
    async fn zero_timeout_still_grants_free_slot() {
        let gate = ConcurrencyGate::new(1);
        assert!(gate.acquire(Duration::ZERO).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_gets_slot_when_released() {
        let gate = Arc::new(ConcurrencyGate::new(1));
        let held = gate.acquire(Duration::from_secs(1)).await.unwrap();

        let g = Arc::clone(&gate);
        let waiter = tokio::spawn(async move { g.acquire(Duration::from_secs(5)).await.is_some() });
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(held);
        assert!(waiter.await.unwrap());
        assert_eq!(gate.granted(), 2);
        assert_eq!(gate.released(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_served_in_arrival_order() {
        let gate = Arc::new(ConcurrencyGate::new(1));
        let held = gate.acquire(Duration::from_secs(1)).await.unwrap();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3 {
            let g = Arc::clone(&gate);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let p = g.acquire(Duration::from_secs(60)).await.unwrap();
                order.lock().push(i);
                tokio::time::sleep(Duration::from_millis(10)).await;
                p.release();
            }));
            // Let each waiter enqueue before the next one.
            tokio::task::yield_now().await;
        }
        held.release();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_is_never_granted() {
        let gate = Arc::new(ConcurrencyGate::new(1));
        let held = gate.acquire(Duration::from_secs(1)).await.unwrap();
        let cancel = CancellationToken::new();

        let g = Arc::clone(&gate);
        let c = cancel.clone();
        let waiter =
            tokio::spawn(async move { g.acquire_cancellable(Duration::from_secs(60), &c).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        assert!(matches!(waiter.await.unwrap(), Acquire::Cancelled));
        assert_eq!(gate.granted(), 1);
        held.release();
        assert_eq!(gate.active(), 0);
    }

    #[tokio::test]
    async fn grants_and_releases_balance() {
        let gate = ConcurrencyGate::new(3);
        for _ in 0..10 {
            let p = gate.acquire(Duration::from_millis(10)).await.unwrap();
            p.release();
        }
        assert_eq!(gate.granted(), 10);
        assert_eq!(gate.released(), 10);
        assert_eq!(gate.active(), 0);
    }

    #[test]
    fn zero_capacity_is_raised() {
        assert_eq!(ConcurrencyGate::new(0).capacity(), 1);
    }
}

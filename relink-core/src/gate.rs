//! Bounded gate (counting semaphore)
//!
//! Admits at most `capacity` concurrent holders. Waiters are served strictly in
//! arrival order: a newcomer never takes a free permit while others are queued.
//!
//! A permit is returned by dropping its [`GatePermit`]. Release hands the permit
//! directly to the oldest live waiter, otherwise increments the free count.
//! Dropping a pending `acquire()` future (e.g. on cancellation) never leaks a
//! permit, even if the permit was handed over just before the drop.

use relink_common::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

#[derive(Debug)]
struct GateState {
    available: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Counting semaphore with a FIFO waiter queue
#[derive(Debug)]
pub struct BoundedGate {
    capacity: usize,
    state: Mutex<GateState>,
}

impl BoundedGate {
    /// Create a gate admitting `capacity` holders
    ///
    /// A zero capacity is a caller bug and is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidInput(
                "gate capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            capacity,
            state: Mutex::new(GateState {
                available: capacity,
                waiters: VecDeque::new(),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held
    pub fn available_permits(&self) -> usize {
        self.lock_state().available
    }

    /// Callers currently queued in `acquire()`
    pub fn waiting(&self) -> usize {
        self.lock_state().waiters.len()
    }

    /// Wait for a permit. Never fails, only suspends.
    pub async fn acquire(self: &Arc<Self>) -> GatePermit {
        loop {
            let rx = {
                let mut state = self.lock_state();
                if state.available > 0 && state.waiters.is_empty() {
                    state.available -= 1;
                    return GatePermit {
                        gate: Arc::clone(self),
                    };
                }
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                rx
            };

            let mut waiter = Waiter {
                gate: self,
                rx,
                granted: false,
            };

            if (&mut waiter.rx).await.is_ok() {
                waiter.granted = true;
                return GatePermit {
                    gate: Arc::clone(self),
                };
            }
            // Sender dropped without a grant; queue again
        }
    }

    fn release(&self) {
        let mut state = self.lock_state();
        while let Some(tx) = state.waiters.pop_front() {
            // A failed send means that waiter gave up; try the next one
            if tx.send(()).is_ok() {
                return;
            }
        }
        state.available += 1;
        debug_assert!(state.available <= self.capacity);
    }

    fn lock_state(&self) -> MutexGuard<'_, GateState> {
        // Counters stay consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A held permit; released on drop
#[derive(Debug)]
pub struct GatePermit {
    gate: Arc<BoundedGate>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// Queued acquire; gives back a permit granted after the caller stopped waiting
struct Waiter<'a> {
    gate: &'a BoundedGate,
    rx: oneshot::Receiver<()>,
    granted: bool,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if self.granted {
            return;
        }
        self.rx.close();
        if self.rx.try_recv().is_ok() {
            self.gate.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn wait_for_waiters(gate: &BoundedGate, count: usize) {
        while gate.waiting() < count {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(BoundedGate::new(0).is_err());
        assert_eq!(BoundedGate::new(3).unwrap().capacity(), 3);
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let gate = Arc::new(BoundedGate::new(2).unwrap());
        let a = gate.acquire().await;
        let b = gate.acquire().await;
        assert_eq!(gate.available_permits(), 0);

        drop(a);
        assert_eq!(gate.available_permits(), 1);
        drop(b);
        assert_eq!(gate.available_permits(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_never_exceeds_capacity() {
        for capacity in [1usize, 2, 5] {
            let gate = Arc::new(BoundedGate::new(capacity).unwrap());
            let current = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));

            let mut handles = Vec::new();
            for _ in 0..30 {
                let gate = Arc::clone(&gate);
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                handles.push(tokio::spawn(async move {
                    let _permit = gate.acquire().await;
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }

            assert!(peak.load(Ordering::SeqCst) <= capacity);
            assert_eq!(gate.available_permits(), capacity);
        }
    }

    #[tokio::test]
    async fn test_waiters_served_in_arrival_order() {
        let gate = Arc::new(BoundedGate::new(1).unwrap());
        let held = gate.acquire().await;
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let gate_clone = Arc::clone(&gate);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _permit = gate_clone.acquire().await;
                order.lock().unwrap().push(i);
            }));
            // Enqueue deterministically, one waiter at a time
            wait_for_waiters(&gate, i + 1).await;
        }

        drop(held);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_does_not_leak_permit() {
        let gate = Arc::new(BoundedGate::new(1).unwrap());
        let held = gate.acquire().await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(10), gate.acquire()).await;
        assert!(timed_out.is_err());

        drop(held);
        assert_eq!(gate.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_permit_granted_to_dropped_waiter_is_returned() {
        let gate = Arc::new(BoundedGate::new(1).unwrap());
        let mut held = Some(gate.acquire().await);

        {
            let pending = gate.acquire();
            tokio::pin!(pending);
            assert!(futures::poll!(&mut pending).is_pending());
            assert_eq!(gate.waiting(), 1);

            // Hands the permit to the queued waiter, which never observes it
            drop(held.take());
            assert_eq!(gate.available_permits(), 0);
        }

        assert_eq!(gate.available_permits(), 1);
    }
}

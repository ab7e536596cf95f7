//! Concurrency gate
//!
//! Counting admission control with strict FIFO handoff:
//! - `acquire` takes a free slot or queues behind earlier callers
//! - dropping a [`GatePermit`] hands its slot straight to the oldest
//!   waiter, so a freed slot is never visible to a newcomer first
//!
//! All state sits behind one mutex; acquire and release never race on the
//! held count.

use crate::error::GateError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Bounded admission primitive shared by every task of a batch
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    inner: Arc<GateInner>,
}

#[derive(Debug)]
struct GateInner {
    limit: usize,
    state: Mutex<GateState>,
}

#[derive(Debug, Default)]
struct GateState {
    held: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `limit` holders
    ///
    /// # Errors
    /// - `GateError::InvalidLimit` if `limit` is zero
    pub fn new(limit: usize) -> Result<Self, GateError> {
        if limit == 0 {
            return Err(GateError::InvalidLimit(limit));
        }

        Ok(Self {
            inner: Arc::new(GateInner {
                limit,
                state: Mutex::new(GateState::default()),
            }),
        })
    }

    /// Wait for a slot
    ///
    /// Cancel-safe: dropping the returned future while queued gives up the
    /// place in line without leaking a slot.
    ///
    /// # Errors
    /// - `GateError::Closed` if the handoff channel is dropped without a slot
    pub async fn acquire(&self) -> Result<GatePermit, GateError> {
        let rx = {
            let mut state = self.inner.state.lock();
            if state.held < self.inner.limit {
                state.held += 1;
                return Ok(GatePermit { gate: self.clone() });
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        let mut pending = PendingSlot {
            gate: self.clone(),
            rx: Some(rx),
        };
        pending.wait().await
    }

    /// Maximum concurrent holders
    #[inline]
    #[must_use]
    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Slots currently held
    #[must_use]
    pub fn held(&self) -> usize {
        self.inner.state.lock().held
    }

    /// Callers queued for a slot
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.inner
            .state
            .lock()
            .waiters
            .iter()
            .filter(|waiter| !waiter.is_closed())
            .count()
    }

    fn release(&self) {
        let mut state = self.inner.state.lock();

        // Transfer the slot to the oldest live waiter; abandoned waiters are skipped
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.send(()).is_ok() {
                return;
            }
        }

        if state.held == 0 {
            tracing::error!("gate released with no slot held");
            debug_assert!(false, "gate released with no slot held");
            return;
        }

        state.held -= 1;
    }
}

/// A held slot; dropping it releases the slot
#[derive(Debug)]
#[must_use = "dropping a permit releases its slot immediately"]
pub struct GatePermit {
    gate: ConcurrencyGate,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// Queued acquirer; returns a slot it was handed but never claimed
struct PendingSlot {
    gate: ConcurrencyGate,
    rx: Option<oneshot::Receiver<()>>,
}

impl PendingSlot {
    async fn wait(&mut self) -> Result<GatePermit, GateError> {
        let rx = self.rx.as_mut().ok_or(GateError::Closed)?;
        let received = rx.await;
        self.rx = None;

        match received {
            Ok(()) => Ok(GatePermit {
                gate: self.gate.clone(),
            }),
            Err(_) => Err(GateError::Closed),
        }
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.gate.release();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::poll;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Poll;
    use std::time::Duration;

    #[test]
    fn zero_limit_is_rejected() {
        assert_eq!(ConcurrencyGate::new(0).unwrap_err(), GateError::InvalidLimit(0));
    }

    #[tokio::test]
    async fn acquire_below_limit_is_immediate() {
        let gate = ConcurrencyGate::new(2).unwrap();

        let a = gate.acquire().await.unwrap();
        let b = gate.acquire().await.unwrap();
        assert_eq!(gate.held(), 2);

        drop(a);
        assert_eq!(gate.held(), 1);
        drop(b);
        assert_eq!(gate.held(), 0);
    }

    #[tokio::test]
    async fn waiters_are_admitted_fifo() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let mut held = gate.acquire().await.unwrap();

        let mut waiters: Vec<_> = (0..4).map(|_| Box::pin(gate.acquire())).collect();
        for waiter in &mut waiters {
            assert!(poll!(waiter.as_mut()).is_pending());
        }
        assert_eq!(gate.waiting(), 4);

        for index in 0..waiters.len() {
            drop(held);

            // Only the oldest waiter may be ready; the slot never returns to the pool
            assert_eq!(gate.held(), 1);
            for later in waiters.iter_mut().skip(index + 1) {
                assert!(poll!(later.as_mut()).is_pending());
            }
            held = match poll!(waiters[index].as_mut()) {
                Poll::Ready(permit) => permit.unwrap(),
                Poll::Pending => panic!("waiter {index} was not admitted"),
            };
        }

        drop(held);
        assert_eq!(gate.held(), 0);
    }

    #[tokio::test]
    async fn abandoned_waiter_is_skipped() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let held = gate.acquire().await.unwrap();

        let mut first = Box::pin(gate.acquire());
        let mut second = Box::pin(gate.acquire());
        assert!(poll!(first.as_mut()).is_pending());
        assert!(poll!(second.as_mut()).is_pending());

        drop(first);
        assert_eq!(gate.waiting(), 1);

        drop(held);
        let permit = match poll!(second.as_mut()) {
            Poll::Ready(permit) => permit.unwrap(),
            Poll::Pending => panic!("second waiter was not admitted"),
        };
        assert_eq!(gate.held(), 1);

        drop(permit);
        assert_eq!(gate.held(), 0);
    }

    #[tokio::test]
    async fn handed_slot_of_dropped_waiter_is_returned() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let held = gate.acquire().await.unwrap();

        let mut waiter = Box::pin(gate.acquire());
        assert!(poll!(waiter.as_mut()).is_pending());

        // Slot transferred to the waiter, which is dropped before claiming it
        drop(held);
        drop(waiter);

        assert_eq!(gate.held(), 0);
        let _again = gate.acquire().await.unwrap();
        assert_eq!(gate.held(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_limit_under_contention() {
        let gate = ConcurrencyGate::new(3).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let gate = gate.clone();
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let _permit = gate.acquire().await.unwrap();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(gate.held(), 0);
    }
}

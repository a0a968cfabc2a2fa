//! Manual-advance clock for deterministic tests.
//!
//! [`FakeClock`] only moves when a test calls [`FakeClock::advance`]. The
//! waiter-aware [`FakeClock::wait_advance`] variant first waits until the
//! expected number of sleepers are parked on the clock, which is what makes
//! timer-driven assertions race-free: the test knows the dispatcher is
//! blocked on its wake before time moves.

use super::{Clock, SleepFuture};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{oneshot, Notify};

/// Returned by [`FakeClock::wait_advance`] and [`FakeClock::wait_sleepers`]
/// when the expected sleepers fail to park in time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("timed out waiting for {wanted} sleeper(s); saw {seen}")]
pub struct WaitTimeout {
    /// How many sleepers the caller expected.
    pub wanted: usize,
    /// How many were parked when the timeout elapsed.
    pub seen: usize,
}

struct Sleeper {
    deadline: Instant,
    tx: oneshot::Sender<()>,
}

struct Inner {
    now: Instant,
    sleepers: Vec<Sleeper>,
}

impl Inner {
    fn prune(&mut self) {
        self.sleepers.retain(|s| !s.tx.is_closed());
    }

    fn fire_due(&mut self) {
        let now = self.now;
        let mut parked = Vec::with_capacity(self.sleepers.len());
        for sleeper in self.sleepers.drain(..) {
            if sleeper.deadline <= now {
                let _ = sleeper.tx.send(());
            } else {
                parked.push(sleeper);
            }
        }
        self.sleepers = parked;
    }
}

/// A [`Clock`] whose time only moves on demand.
pub struct FakeClock {
    inner: Mutex<Inner>,
    changed: Notify,
}

impl FakeClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a clock frozen at `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            inner: Mutex::new(Inner {
                now: start,
                sleepers: Vec::new(),
            }),
            changed: Notify::new(),
        }
    }

    /// Moves the clock forward, waking every sleeper whose deadline has
    /// been reached.
    pub fn advance(&self, step: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.now += step;
        inner.fire_due();
        drop(inner);
        self.changed.notify_waiters();
    }

    /// Number of live sleepers currently parked on the clock.
    pub fn sleeper_count(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.prune();
        inner.sleepers.len()
    }

    /// Waits until at least `count` sleepers are parked, then advances.
    ///
    /// Mirrors the shape of timer-driven tests: advance only once the code
    /// under test is demonstrably blocked on its timer.
    pub async fn wait_advance(
        &self,
        step: Duration,
        count: usize,
        timeout: Duration,
    ) -> Result<(), WaitTimeout> {
        self.wait_sleepers(count, timeout).await?;
        self.advance(step);
        Ok(())
    }

    /// Waits until at least `count` sleepers are parked on the clock.
    pub async fn wait_sleepers(&self, count: usize, timeout: Duration) -> Result<(), WaitTimeout> {
        let parked = async {
            loop {
                let notified = self.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.sleeper_count() >= count {
                    return;
                }
                notified.await;
            }
        };
        match tokio::time::timeout(timeout, parked).await {
            Ok(()) => Ok(()),
            Err(_) => Err(WaitTimeout {
                wanted: count,
                seen: self.sleeper_count(),
            }),
        }
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.lock().unwrap().now
    }

    fn sleep_until(&self, deadline: Instant) -> SleepFuture {
        let mut inner = self.inner.lock().unwrap();
        if deadline <= inner.now {
            return Box::pin(std::future::ready(()));
        }
        let (tx, rx) = oneshot::channel();
        inner.sleepers.push(Sleeper { deadline, tx });
        drop(inner);
        self.changed.notify_waiters();
        Box::pin(async move {
            // Sender dropped only if the clock itself is dropped; either way
            // the sleep is over.
            let _ = rx.await;
        })
    }
}

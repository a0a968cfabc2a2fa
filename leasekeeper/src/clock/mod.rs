//! Clock abstraction for the lease manager.
//!
//! The dispatcher never reads the system time directly; everything flows
//! through a [`Clock`] handle so tests can drive time deterministically with
//! [`fake::FakeClock`]. The production implementation is [`SystemClock`],
//! backed by `tokio::time`.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

pub mod fake;

/// Boxed sleep future returned by [`Clock::sleep_until`].
pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Source of monotonic time and single-shot timers.
///
/// The dispatcher recomputes its desired wake on every loop iteration and
/// asks for a fresh sleep future each time; implementations never need to
/// track "did the previous timer already fire".
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant on this clock.
    fn now(&self) -> Instant;

    /// Returns a future that completes once the clock reaches `deadline`.
    ///
    /// A deadline at or before [`Clock::now`] completes immediately.
    fn sleep_until(&self, deadline: Instant) -> SleepFuture;
}

/// Production clock over the tokio timer wheel.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) -> SleepFuture {
        Box::pin(tokio::time::sleep_until(tokio::time::Instant::from_std(
            deadline,
        )))
    }
}

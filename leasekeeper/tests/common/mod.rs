//! Shared fixture for manager integration tests.
//!
//! The [`ScriptedStore`] replays an expected-call list: each store call must
//! match the next scripted [`Call`], may mutate the store's lease table, and
//! returns the scripted outcome. Unexpected or mismatched calls are recorded
//! and failed at teardown, so a test's script is an exact transcript of the
//! store traffic it allows.
//!
//! Time is driven by [`FakeClock::wait_advance`]: advance only once the
//! dispatcher is parked on its timer, which keeps timer-driven assertions
//! race-free.

// Each suite uses its own slice of the fixture API.
#![allow(dead_code)]

use leasekeeper::clock::fake::FakeClock;
use leasekeeper::clock::Clock;
use leasekeeper::lease::{Info, Key, LeaseRequest};
use leasekeeper::manager::{Claimer, Checker, Error, Manager, ManagerConfig, ManagerHandle, Pinner};
use leasekeeper::secretary::StandardSecretary;
use leasekeeper::store::{Snapshot, Store, StoreError, StoreFuture};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub const NAMESPACE: &str = "namespace";
pub const MODEL: &str = "model-uuid";

/// Generous bound for anything that should happen promptly.
pub const LONG_WAIT: Duration = Duration::from_secs(5);

pub fn key(lease: &str) -> Key {
    Key::new(NAMESPACE, MODEL, lease)
}

pub fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

/// Just short of `s` seconds; long enough to prove a timer did not fire.
pub fn almost_secs(s: u64) -> Duration {
    Duration::from_secs(s) - Duration::from_millis(1)
}

fn offset(start: Instant, offset_secs: i64) -> Instant {
    if offset_secs >= 0 {
        start + Duration::from_secs(offset_secs as u64)
    } else {
        start
            .checked_sub(Duration::from_secs((-offset_secs) as u64))
            .expect("offset before clock epoch")
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Scripted store
// =============================================================================

/// Store operations a script can expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Refresh,
    Claim(Key, LeaseRequest),
    Extend(Key, LeaseRequest),
    Expire(Key),
    Pin(Key, String),
    Unpin(Key, String),
}

/// State edits applied when the scripted call happens, before its result is
/// produced (a call can both mutate the table and fail).
#[derive(Debug, Clone)]
enum Mutation {
    Remove(String),
    Grant {
        lease: String,
        holder: String,
        offset_secs: i64,
    },
}

/// One expected store call.
#[derive(Debug)]
pub struct Call {
    op: Op,
    error: Option<StoreError>,
    mutations: Vec<Mutation>,
}

impl Call {
    fn new(op: Op) -> Self {
        Self {
            op,
            error: None,
            mutations: Vec::new(),
        }
    }

    /// Scripts this call to fail with `error`.
    pub fn err(mut self, error: StoreError) -> Self {
        self.error = Some(error);
        self
    }

    /// Removes `lease` from the store's table when this call happens.
    pub fn removing(mut self, lease: &str) -> Self {
        self.mutations.push(Mutation::Remove(lease.to_string()));
        self
    }

    /// Writes `lease → (holder, start + offset_secs)` when this call
    /// happens.
    pub fn granting(mut self, lease: &str, holder: &str, offset_secs: i64) -> Self {
        self.mutations.push(Mutation::Grant {
            lease: lease.to_string(),
            holder: holder.to_string(),
            offset_secs,
        });
        self
    }
}

pub fn refresh() -> Call {
    Call::new(Op::Refresh)
}

pub fn claim(lease: &str, holder: &str, duration_secs: u64) -> Call {
    Call::new(Op::Claim(
        key(lease),
        LeaseRequest::new(holder, secs(duration_secs)),
    ))
}

pub fn extend(lease: &str, holder: &str, duration_secs: u64) -> Call {
    Call::new(Op::Extend(
        key(lease),
        LeaseRequest::new(holder, secs(duration_secs)),
    ))
}

pub fn expire(lease: &str) -> Call {
    Call::new(Op::Expire(key(lease)))
}

pub fn pin(lease: &str, entity: &str) -> Call {
    Call::new(Op::Pin(key(lease), entity.to_string()))
}

pub fn unpin(lease: &str, entity: &str) -> Call {
    Call::new(Op::Unpin(key(lease), entity.to_string()))
}

struct StoreInner {
    state: Snapshot,
    script: VecDeque<Call>,
    failures: Vec<String>,
}

pub struct ScriptedStore {
    start: Instant,
    auto_expire: bool,
    inner: Mutex<StoreInner>,
}

impl ScriptedStore {
    fn apply(&self, mutations: &[Mutation], state: &mut Snapshot) {
        for mutation in mutations {
            match mutation {
                Mutation::Remove(lease) => {
                    state.remove(&key(lease));
                }
                Mutation::Grant {
                    lease,
                    holder,
                    offset_secs,
                } => {
                    state.insert(
                        key(lease),
                        Info::new(holder.as_str(), offset(self.start, *offset_secs)),
                    );
                }
            }
        }
    }

    /// Matches `op` against the script, applies the expected call's
    /// mutations, and returns its scripted error (if any).
    fn step(&self, op: Op) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(expected) = inner.script.pop_front() else {
            inner
                .failures
                .push(format!("unexpected store call: {op:?}"));
            return Err(StoreError::other("unexpected store call"));
        };
        if expected.op != op {
            inner
                .failures
                .push(format!("expected {:?}, got {op:?}", expected.op));
            return Err(StoreError::other("unexpected store call"));
        }
        let mutations = expected.mutations;
        let state = &mut inner.state;
        self.apply(&mutations, state);
        match expected.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn lookup(&self, key: &Key) -> Result<Info, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .state
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::other("scripted call granted no lease"))
    }

    fn snapshot(&self) -> Snapshot {
        self.inner.lock().unwrap().state.clone()
    }

    fn take_failures(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.lock().unwrap().failures)
    }

    fn remaining(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .script
            .iter()
            .map(|call| format!("{:?}", call.op))
            .collect()
    }
}

impl Store for ScriptedStore {
    fn auto_expire(&self) -> bool {
        self.auto_expire
    }

    fn refresh(&self) -> StoreFuture<'_, Snapshot> {
        let result = self.step(Op::Refresh).map(|()| self.snapshot());
        Box::pin(async move { result })
    }

    fn claim(&self, key: Key, request: LeaseRequest) -> StoreFuture<'_, Info> {
        let result = self
            .step(Op::Claim(key.clone(), request))
            .and_then(|()| self.lookup(&key));
        Box::pin(async move { result })
    }

    fn extend(&self, key: Key, request: LeaseRequest) -> StoreFuture<'_, Info> {
        let result = self
            .step(Op::Extend(key.clone(), request))
            .and_then(|()| self.lookup(&key));
        Box::pin(async move { result })
    }

    fn expire(&self, key: Key) -> StoreFuture<'_, ()> {
        let result = self.step(Op::Expire(key));
        Box::pin(async move { result })
    }

    fn pin(&self, key: Key, entity: String) -> StoreFuture<'_, ()> {
        let result = self.step(Op::Pin(key.clone(), entity.clone())).map(|()| {
            // Pins persist in the store; the next refresh must show them.
            if let Some(info) = self.inner.lock().unwrap().state.get_mut(&key) {
                info.pinned.insert(entity);
            }
        });
        Box::pin(async move { result })
    }

    fn unpin(&self, key: Key, entity: String) -> StoreFuture<'_, ()> {
        let result = self.step(Op::Unpin(key.clone(), entity.clone())).map(|()| {
            if let Some(info) = self.inner.lock().unwrap().state.get_mut(&key) {
                info.pinned.remove(&entity);
            }
        });
        Box::pin(async move { result })
    }
}

// =============================================================================
// Fixture
// =============================================================================

/// Initial lease table plus the exact store traffic a test allows.
pub struct Fixture {
    leases: Vec<(String, String, i64)>,
    script: Vec<Call>,
    auto_expire: bool,
    expect_dirty: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            leases: Vec::new(),
            script: Vec::new(),
            auto_expire: false,
            expect_dirty: false,
        }
    }

    /// Seeds the store with `lease → (holder, start + offset_secs)`.
    pub fn lease(mut self, lease: &str, holder: &str, offset_secs: i64) -> Self {
        self.leases
            .push((lease.to_string(), holder.to_string(), offset_secs));
        self
    }

    /// Appends an expected store call.
    pub fn expect(mut self, call: Call) -> Self {
        self.script.push(call);
        self
    }

    /// Marks the store as auto-expiring.
    pub fn auto_expire(mut self) -> Self {
        self.auto_expire = true;
        self
    }

    /// The manager is expected to die dirty instead of stopping cleanly.
    pub fn dirty(mut self) -> Self {
        self.expect_dirty = true;
        self
    }

    /// Runs `test` against a freshly spawned manager and returns the
    /// manager's exit result after teardown assertions.
    pub async fn run<F, Fut>(self, test: F) -> Result<(), Error>
    where
        F: FnOnce(Harness) -> Fut,
        Fut: Future<Output = ()>,
    {
        init_tracing();

        let clock = Arc::new(FakeClock::new());
        let start = clock.now();

        let mut state = Snapshot::new();
        for (lease, holder, offset_secs) in &self.leases {
            state.insert(
                key(lease),
                Info::new(holder.clone(), offset(start, *offset_secs)),
            );
        }
        let store = Arc::new(ScriptedStore {
            start,
            auto_expire: self.auto_expire,
            inner: Mutex::new(StoreInner {
                state,
                script: self.script.into(),
                failures: Vec::new(),
            }),
        });

        let config = ManagerConfig::new(store.clone(), clock.clone(), "manager-under-test")
            .with_secretary(NAMESPACE, Arc::new(StandardSecretary::default()));
        let (manager, handle) = Manager::new(config).expect("config should validate");

        let shutdown = CancellationToken::new();
        let running = tokio::spawn(manager.run(shutdown.clone()));

        let harness = Harness {
            handle,
            clock: clock.clone(),
            start,
            shutdown: shutdown.clone(),
        };
        test(harness).await;

        // Let the dispatcher finish in-flight work: either it parks on its
        // timer again or (dirty runs, shutdown tests) the task ends.
        let settle = Instant::now() + LONG_WAIT;
        while !running.is_finished() && clock.sleeper_count() == 0 {
            assert!(Instant::now() < settle, "dispatcher never settled");
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        shutdown.cancel();
        let result = tokio::time::timeout(LONG_WAIT, running)
            .await
            .expect("manager should stop promptly")
            .expect("manager task should not panic");

        let failures = store.take_failures();
        assert!(failures.is_empty(), "store failures: {failures:?}");
        let remaining = store.remaining();
        assert!(remaining.is_empty(), "unconsumed store calls: {remaining:?}");
        if self.expect_dirty {
            assert!(result.is_err(), "manager should have died dirty");
        } else {
            assert!(
                result.is_ok(),
                "manager should stop cleanly, got: {:?}",
                result.as_ref().err().map(|e| e.to_string()),
            );
        }
        result
    }
}

/// What a test closure gets to work with.
pub struct Harness {
    pub handle: ManagerHandle,
    pub clock: Arc<FakeClock>,
    pub start: Instant,
    pub shutdown: CancellationToken,
}

impl Harness {
    pub fn claimer(&self) -> Claimer {
        self.handle
            .claimer(NAMESPACE, MODEL)
            .expect("namespace should have a secretary")
    }

    pub fn checker(&self) -> Checker {
        self.handle
            .checker(NAMESPACE, MODEL)
            .expect("namespace should have a secretary")
    }

    pub fn pinner(&self) -> Pinner {
        self.handle
            .pinner(NAMESPACE, MODEL)
            .expect("namespace should have a secretary")
    }

    /// Waits for the dispatcher to park on its timer, then advances.
    pub async fn wait_advance(&self, step: Duration) {
        self.clock
            .wait_advance(step, 1, LONG_WAIT)
            .await
            .expect("dispatcher should park on its timer");
    }
}

/// Polls `fut` exactly once, asserting it stays pending. Drives a façade
/// call far enough to enqueue its request without awaiting the reply, so a
/// later request is guaranteed to be handled after it.
pub async fn prime<F: Future>(fut: &mut Pin<&mut F>) {
    std::future::poll_fn(|cx| match fut.as_mut().poll(cx) {
        Poll::Pending => Poll::Ready(()),
        Poll::Ready(_) => panic!("future resolved on first poll"),
    })
    .await;
}

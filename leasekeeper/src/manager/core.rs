//! Manager struct and dispatcher run loop.
//!
//! Handler methods live in sibling modules: `claims` for client
//! operations, `expiry` for the timer-driven refresh-and-expire pass.

use super::blocks::BlockRegistry;
use super::config::ManagerConfig;
use super::error::Error;
use super::handle::ManagerHandle;
use super::request::Request;
use crate::clock::Clock;
use crate::lease::{Info, Key};
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Single-writer coordinator for one store's lease table.
///
/// Owns the cache and the block registry outright; nothing else touches
/// them. Created together with the [`ManagerHandle`] clients use, then
/// consumed by [`Manager::run`], which the embedder spawns.
pub struct Manager {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) max_sleep: Duration,
    pub(crate) entity_uuid: String,

    /// Authoritative-as-of-last-refresh view of the lease table.
    pub(crate) leases: HashMap<Key, Info>,

    /// Waiters keyed by the lease they watch.
    pub(crate) blocks: BlockRegistry,

    /// Earliest instant a claim/extend grant could expire by this
    /// manager's own clock. Cleared at every tick.
    pub(crate) probe: Option<Instant>,

    requests: mpsc::Receiver<Request>,
}

impl Manager {
    /// Builds a manager and the handle clients use to reach it.
    pub fn new(config: ManagerConfig) -> Result<(Self, ManagerHandle), super::ConfigError> {
        config.validate()?;
        let (tx, rx) = mpsc::channel(config.request_capacity);
        let handle = ManagerHandle::new(tx, config.secretaries);
        let manager = Self {
            store: config.store,
            clock: config.clock,
            max_sleep: config.max_sleep,
            entity_uuid: config.entity_uuid,
            leases: HashMap::new(),
            blocks: BlockRegistry::default(),
            probe: None,
            requests: rx,
        };
        Ok((manager, handle))
    }

    /// Runs the dispatcher until `shutdown` is cancelled, every handle is
    /// dropped, or the expiration path hits a fatal store error.
    ///
    /// A clean stop returns `Ok(())`; a dirty one returns the store error
    /// that killed the loop, so supervising code can restart the manager.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), Error> {
        info!(entity = %self.entity_uuid, "lease manager started");
        let result = self.dispatch(&shutdown).await;
        self.stop();
        match &result {
            Ok(()) => info!(entity = %self.entity_uuid, "lease manager stopped"),
            Err(err) => {
                error!(entity = %self.entity_uuid, error = %err, "lease manager stopped dirty")
            }
        }
        result
    }

    async fn dispatch(&mut self, shutdown: &CancellationToken) -> Result<(), Error> {
        // Startup pass: a lease already past its expiry is handled without
        // waiting for a timer fire.
        self.tick().await?;

        loop {
            let sleep = self.clock.sleep_until(self.next_wake());
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => return Ok(()),

                _ = sleep => self.tick().await?,

                request = self.requests.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => return Ok(()),
                },
            }
        }
    }

    /// Earliest instant worth waking at: the soonest unpinned future
    /// expiry, the pending probe, or `now + max_sleep`, whichever is
    /// closest.
    fn next_wake(&self) -> Instant {
        let now = self.clock.now();
        let mut wake = now + self.max_sleep;
        for info in self.leases.values() {
            if info.pinned.is_empty() && info.expiry > now && info.expiry < wake {
                wake = info.expiry;
            }
        }
        match self.probe {
            Some(probe) if probe < wake => probe,
            _ => wake,
        }
    }

    /// Schedules a wake no later than `at`.
    pub(crate) fn set_probe(&mut self, at: Instant) {
        match self.probe {
            Some(existing) if existing <= at => {}
            _ => self.probe = Some(at),
        }
    }

    /// Discards queued requests and parked waiters. Everyone observes
    /// their channel closing and maps it to [`Error::Stopping`].
    fn stop(&mut self) {
        self.requests.close();
        while let Ok(request) = self.requests.try_recv() {
            request.fail(Error::Stopping);
        }
        self.blocks.clear();
    }
}

//! Timer-driven refresh and expiration.
//!
//! A tick refreshes the cache from the store and expires every unpinned
//! lease whose expiry has passed, in sorted key order. Stale-view races are
//! absorbed, with the store's truth winning; any other store failure on
//! this path stops the dispatcher dirty, leaving restart decisions to the
//! supervising code.

use super::core::Manager;
use super::error::Error;
use crate::lease::Key;
use crate::store::StoreError;
use tracing::{debug, info, warn};

impl Manager {
    /// One refresh-and-expire pass. Runs at startup and on every timer
    /// fire.
    pub(crate) async fn tick(&mut self) -> Result<(), Error> {
        self.probe = None;
        self.refresh().await.map_err(Error::Store)?;
        if self.store.auto_expire() {
            // The store drops expired records on its own schedule; vacancy
            // shows up in the next snapshot.
            return Ok(());
        }
        self.expire_due().await
    }

    /// Pulls the authoritative lease table into the cache and releases any
    /// waiters whose watched tenure is over.
    pub(crate) async fn refresh(&mut self) -> Result<(), StoreError> {
        debug!("refreshing lease table");
        let snapshot = self.store.refresh().await?;
        self.leases = snapshot;
        self.blocks.release_satisfied(&self.leases);
        Ok(())
    }

    /// Refresh on behalf of a client request. A store failure here is the
    /// caller's problem, not the manager's. A lease the new snapshot shows
    /// already past due gets an immediate wake instead of waiting out an
    /// unrelated timer.
    pub(crate) async fn refresh_from_request(&mut self) -> Result<(), Error> {
        self.refresh().await.map_err(Error::Store)?;
        if !self.store.auto_expire() {
            let now = self.clock.now();
            if self.leases.values().any(|info| info.due_at(now)) {
                self.set_probe(now);
            }
        }
        Ok(())
    }

    async fn expire_due(&mut self) -> Result<(), Error> {
        let now = self.clock.now();
        let mut due: Vec<Key> = self
            .leases
            .iter()
            .filter(|(_, info)| info.due_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        due.sort();

        for key in due {
            // A refresh triggered earlier in this sweep may have resolved
            // this key already.
            let still_due = self
                .leases
                .get(&key)
                .map_or(false, |info| info.due_at(now));
            if !still_due {
                continue;
            }
            self.expire_one(&key).await?;
        }
        Ok(())
    }

    async fn expire_one(&mut self, key: &Key) -> Result<(), Error> {
        let now = self.clock.now();
        for _ in 0..2 {
            match self.store.expire(key.clone()).await {
                Ok(()) => {
                    self.leases.remove(key);
                    self.blocks.release_satisfied(&self.leases);
                    info!(key = %key, "lease expired");
                    return Ok(());
                }
                Err(StoreError::Invalid) => {
                    self.refresh().await.map_err(Error::Store)?;
                    match self.leases.get(key) {
                        Some(info) if info.due_at(now) => continue,
                        // Gone, extended, or pinned since: the store's
                        // truth wins, nothing to expire.
                        _ => return Ok(()),
                    }
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "lease expiry failed");
                    return Err(Error::Store(err));
                }
            }
        }
        // Still racing after a refresh and a retry; the next tick gets it.
        Ok(())
    }
}

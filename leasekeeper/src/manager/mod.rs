//! The lease manager: a single-owner dispatcher over the lease table.
//!
//! All mutation flows through one task. Client façades translate typed
//! method calls into request messages; the dispatcher drains them one at a
//! time, consults its in-memory cache, calls the store, and fires
//! expirations from its own timer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  Claim/Extend/..  ┌───────────────────────────────┐
//! │ Claimer  │ ───► Request ───► │          Dispatcher           │
//! ├──────────┤                   │                               │
//! │ Checker  │ ───► Request ───► │  cache: Key → Info            │
//! ├──────────┤                   │  blocks: Key → waiters        │
//! │ Pinner   │ ───► Request ───► │  timer: next unpinned expiry  │
//! └──────────┘ ◄─── reply ────── │                               │
//!                                └───────┬───────────────────────┘
//!                                        │ refresh/claim/extend/expire
//!                                        ▼
//!                                ┌───────────────┐
//!                                │     Store     │
//!                                └───────────────┘
//! ```
//!
//! Requests are handled in FIFO order; for a given key no two operations
//! overlap, and effects become visible atomically at the cache update
//! following the store reply.
//!
//! # Example
//!
//! ```ignore
//! let (manager, handle) = Manager::new(config)?;
//! let shutdown = CancellationToken::new();
//! let running = tokio::spawn(manager.run(shutdown.clone()));
//!
//! let claimer = handle.claimer("application-leadership", model_uuid)?;
//! claimer.claim("redis", "redis/0", Duration::from_secs(60)).await?;
//! ```

mod blocks;
mod claims;
mod config;
mod core;
mod error;
mod expiry;
mod handle;
mod request;

pub use config::{ConfigError, ManagerConfig, DEFAULT_MAX_SLEEP, DEFAULT_REQUEST_CAPACITY};
pub use core::Manager;
pub use error::Error;
pub use handle::{Claimer, Checker, ManagerHandle, Pinner};

//! Manager configuration.

use crate::clock::Clock;
use crate::secretary::Secretary;
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Ceiling on the timer interval when no lease has a closer expiry.
pub const DEFAULT_MAX_SLEEP: Duration = Duration::from_secs(3600);

/// Default request channel capacity.
pub const DEFAULT_REQUEST_CAPACITY: usize = 64;

/// Rejected configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No namespace has a secretary; no façade could ever be built.
    #[error("no secretaries configured")]
    NoSecretaries,

    /// `max_sleep` was zero.
    #[error("max_sleep must be positive")]
    ZeroMaxSleep,

    /// `entity_uuid` was empty.
    #[error("entity_uuid must not be empty")]
    EmptyEntityUuid,

    /// `request_capacity` was zero.
    #[error("request_capacity must be positive")]
    ZeroRequestCapacity,
}

/// Everything a [`Manager`](super::Manager) needs to run.
///
/// No CLI, no environment variables, no files: the embedder assembles this
/// in memory and hands it over.
pub struct ManagerConfig {
    /// Validator per namespace. A namespace without an entry cannot be
    /// served.
    pub secretaries: HashMap<String, Arc<dyn Secretary>>,

    /// The replicated lease table.
    pub store: Arc<dyn Store>,

    /// Time source for expiries and the wake timer.
    pub clock: Arc<dyn Clock>,

    /// Ceiling on how long the dispatcher sleeps with nothing due.
    pub max_sleep: Duration,

    /// Identity of this manager, for logs.
    pub entity_uuid: String,

    /// Capacity of the request channel feeding the dispatcher.
    pub request_capacity: usize,
}

impl ManagerConfig {
    /// Creates a config with default `max_sleep` and channel capacity and
    /// no secretaries yet.
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, entity_uuid: impl Into<String>) -> Self {
        Self {
            secretaries: HashMap::new(),
            store,
            clock,
            max_sleep: DEFAULT_MAX_SLEEP,
            entity_uuid: entity_uuid.into(),
            request_capacity: DEFAULT_REQUEST_CAPACITY,
        }
    }

    /// Registers `secretary` for `namespace`.
    pub fn with_secretary(
        mut self,
        namespace: impl Into<String>,
        secretary: Arc<dyn Secretary>,
    ) -> Self {
        self.secretaries.insert(namespace.into(), secretary);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.secretaries.is_empty() {
            return Err(ConfigError::NoSecretaries);
        }
        if self.max_sleep.is_zero() {
            return Err(ConfigError::ZeroMaxSleep);
        }
        if self.entity_uuid.is_empty() {
            return Err(ConfigError::EmptyEntityUuid);
        }
        if self.request_capacity == 0 {
            return Err(ConfigError::ZeroRequestCapacity);
        }
        Ok(())
    }
}

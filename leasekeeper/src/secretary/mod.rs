//! Per-namespace validation of lease names, holder names, and durations.
//!
//! A [`Secretary`] rejects malformed input before the dispatcher touches the
//! cache or the store. Each namespace the manager serves gets its own
//! secretary, so naming rules can differ between, say, singular-controller
//! leases and application-leadership leases.

use std::time::Duration;
use thiserror::Error;

/// Maximum identifier length accepted by [`StandardSecretary`].
pub const MAX_NAME_LEN: usize = 256;

/// Validation failure, naming the offending value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {what} {value:?}: {reason}")]
pub struct ValidationError {
    /// What was being validated ("lease name", "holder name", "duration").
    pub what: &'static str,
    /// The rejected value, rendered for the message.
    pub value: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl ValidationError {
    pub(crate) fn new(what: &'static str, value: impl Into<String>, reason: &'static str) -> Self {
        Self {
            what,
            value: value.into(),
            reason,
        }
    }
}

/// Validator bundle for one namespace.
pub trait Secretary: Send + Sync + 'static {
    /// Checks a lease name.
    fn check_lease(&self, name: &str) -> Result<(), ValidationError>;

    /// Checks a holder name. Pin entities are validated with this too.
    fn check_holder(&self, name: &str) -> Result<(), ValidationError>;

    /// Checks a requested duration.
    fn check_duration(&self, duration: Duration) -> Result<(), ValidationError>;
}

/// Stock secretary: printable non-empty identifiers, bounded length, and a
/// positive duration with a configurable cap.
#[derive(Debug, Clone)]
pub struct StandardSecretary {
    max_duration: Duration,
}

impl StandardSecretary {
    /// Creates a secretary accepting durations up to `max_duration`.
    pub fn new(max_duration: Duration) -> Self {
        Self { max_duration }
    }

    fn check_name(name: &str, what: &'static str) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::new(what, name, "must not be empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(ValidationError::new(what, name, "too long"));
        }
        if name
            .chars()
            .any(|c| c.is_control() || c.is_whitespace())
        {
            return Err(ValidationError::new(
                what,
                name,
                "must be printable without whitespace",
            ));
        }
        Ok(())
    }
}

impl Default for StandardSecretary {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 3600))
    }
}

impl Secretary for StandardSecretary {
    fn check_lease(&self, name: &str) -> Result<(), ValidationError> {
        Self::check_name(name, "lease name")
    }

    fn check_holder(&self, name: &str) -> Result<(), ValidationError> {
        Self::check_name(name, "holder name")
    }

    fn check_duration(&self, duration: Duration) -> Result<(), ValidationError> {
        if duration.is_zero() {
            return Err(ValidationError::new(
                "duration",
                format!("{duration:?}"),
                "must be positive",
            ));
        }
        if duration > self.max_duration {
            return Err(ValidationError::new(
                "duration",
                format!("{duration:?}"),
                "exceeds maximum",
            ));
        }
        Ok(())
    }
}

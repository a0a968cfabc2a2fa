//! Typed request messages between façades and the dispatcher.

use super::error::Error;
use crate::lease::Key;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Reply channel for a request. Exactly one result is sent per accepted
/// request; a dropped receiver means the caller went away and the reply is
/// discarded.
pub(crate) type Reply = oneshot::Sender<Result<(), Error>>;

/// A client request as it travels down the dispatcher channel.
///
/// Validation has already happened in the façade; the dispatcher only sees
/// well-formed keys, holders, and durations.
pub(crate) enum Request {
    Claim {
        key: Key,
        holder: String,
        duration: Duration,
        reply: Reply,
    },
    Extend {
        key: Key,
        holder: String,
        duration: Duration,
        reply: Reply,
    },
    Revoke {
        key: Key,
        holder: String,
        reply: Reply,
    },
    Check {
        key: Key,
        holder: String,
        reply: Reply,
    },
    WaitExpired {
        key: Key,
        /// The holder whose tenure the waiter is watching.
        holder: String,
        reply: Reply,
        cancel: CancellationToken,
    },
    Pin {
        key: Key,
        entity: String,
        reply: Reply,
    },
    Unpin {
        key: Key,
        entity: String,
        reply: Reply,
    },
}

impl Request {
    /// Short operation name for logging.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Claim { .. } => "claim",
            Self::Extend { .. } => "extend",
            Self::Revoke { .. } => "revoke",
            Self::Check { .. } => "check",
            Self::WaitExpired { .. } => "wait-expired",
            Self::Pin { .. } => "pin",
            Self::Unpin { .. } => "unpin",
        }
    }

    /// Fails the request without handling it. Used when draining the
    /// channel at shutdown.
    pub(crate) fn fail(self, err: Error) {
        let reply = match self {
            Self::Claim { reply, .. }
            | Self::Extend { reply, .. }
            | Self::Revoke { reply, .. }
            | Self::Check { reply, .. }
            | Self::WaitExpired { reply, .. }
            | Self::Pin { reply, .. }
            | Self::Unpin { reply, .. } => reply,
        };
        let _ = reply.send(Err(err));
    }
}

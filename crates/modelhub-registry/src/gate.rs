//! Two-step confirmation for destructive deletes.
//!
//! The first request for a target arms it; a second request for the same
//! target inside the confirmation window goes through. Only one target is
//! armed at a time. Expiry is checked when the next request arrives, so no
//! timer or background task is involved.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Default time a delete stays armed.
pub const DEFAULT_CONFIRM_WINDOW: Duration = Duration::from_secs(5);

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub(crate) use manual::ManualClock;


/// Answer to a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The target is now armed; repeat the request to delete it.
    ConfirmAgain,

    /// The target was confirmed and removed.
    Deleted,
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfirmAgain => write!(f, "confirm again"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone)]
struct Armed<K> {
    target: K,
    expires_at: DateTime<Utc>,
}

/// Confirmation gate keyed by whatever identifies a deletable target.
pub struct DeletionGate<K> {
    armed: Option<Armed<K>>,
    window: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl<K: PartialEq + Clone + fmt::Debug> DeletionGate<K> {
    /// Create a gate with the given clock and confirmation window.
    pub fn new(clock: Arc<dyn Clock>, window: Duration) -> Self {
        let window = chrono::Duration::from_std(window)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_CONFIRM_WINDOW.as_secs() as i64));
        Self {
            armed: None,
            window,
            clock,
        }
    }

    /// Ask to delete `target`.
    ///
    /// Returns [`DeleteOutcome::Deleted`] when this call confirms an earlier,
    /// unexpired request for the same target. Any other call (re)arms the
    /// gate for `target` and returns [`DeleteOutcome::ConfirmAgain`].
    pub fn request(&mut self, target: K) -> DeleteOutcome {
        let now = self.clock.now();

        match self.armed.take() {
            Some(armed) if armed.target == target && now < armed.expires_at => {
                DeleteOutcome::Deleted
            }
            previous => {
                if let Some(previous) = previous {
                    if previous.target != target && now < previous.expires_at {
                        tracing::debug!(pending = ?previous.target, "disarming pending delete");
                    }
                }
                self.armed = Some(Armed {
                    target,
                    expires_at: now + self.window,
                });
                DeleteOutcome::ConfirmAgain
            }
        }
    }

    /// The currently armed target, if its window has not passed.
    pub fn armed_target(&self) -> Option<&K> {
        let now = self.clock.now();
        self.armed
            .as_ref()
            .filter(|armed| now < armed.expires_at)
            .map(|armed| &armed.target)
    }

    /// Drop any pending request.
    pub fn disarm(&mut self) {
        self.armed = None;
    }
}

impl<K: fmt::Debug> fmt::Debug for DeletionGate<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeletionGate")
            .field("armed", &self.armed.as_ref().map(|a| &a.target))
            .field("window", &self.window)
            .finish()
    }
}

//! Shared busy/error indicator
//!
//! One beacon is shared by the session controller, the role resolver and the
//! module registry. Busy is a counter of in-flight operations so that two
//! overlapping operations cannot clear each other's indicator.

use adminkit_core::ConsoleError;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Point-in-time view of the beacon
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub busy: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct StatusInner {
    in_flight: usize,
    last_error: Option<String>,
}

impl StatusInner {
    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            busy: self.in_flight > 0,
            last_error: self.last_error.clone(),
        }
    }
}

/// Busy flag and last user-facing error message
#[derive(Clone)]
pub struct StatusBeacon {
    inner: Arc<RwLock<StatusInner>>,
    events: broadcast::Sender<StatusSnapshot>,
}

impl StatusBeacon {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(StatusInner::default())),
            events,
        }
    }

    /// `true` registers one more operation in flight, `false` retires one
    pub fn set_busy(&self, busy: bool) {
        self.update(|inner| {
            if busy {
                inner.in_flight += 1;
            } else {
                inner.in_flight = inner.in_flight.saturating_sub(1);
            }
        });
    }

    pub fn set_error(&self, error: Option<String>) {
        self.update(|inner| inner.last_error = error);
    }

    /// Mark the beacon busy until the returned guard is dropped
    pub fn busy_guard(&self) -> BusyGuard {
        self.set_busy(true);
        BusyGuard {
            beacon: self.clone(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.inner.read().in_flight > 0
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.read().last_error.clone()
    }

    /// Return the last error and clear it
    pub fn take_error(&self) -> Option<String> {
        let mut taken = None;
        self.update(|inner| taken = inner.last_error.take());
        taken
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().snapshot()
    }

    /// Receive a snapshot after every change
    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.events.subscribe()
    }

    /// Back to idle with no error
    pub fn reset(&self) {
        self.update(|inner| *inner = StatusInner::default());
    }

    /// Log a failed operation and surface its message
    pub(crate) fn report(&self, error: &ConsoleError) {
        error.log();
        self.set_error(Some(error.message()));
    }

    fn update(&self, apply: impl FnOnce(&mut StatusInner)) {
        let (before, after) = {
            let mut inner = self.inner.write();
            let before = inner.snapshot();
            apply(&mut inner);
            (before, inner.snapshot())
        };

        if before != after {
            // No subscribers is fine
            let _ = self.events.send(after);
        }
    }
}

impl Default for StatusBeacon {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusBeacon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBeacon")
            .field("status", &self.snapshot())
            .finish()
    }
}

/// Retires one in-flight operation on drop, including on early return
#[must_use = "the beacon is released as soon as the guard is dropped"]
pub struct BusyGuard {
    beacon: StatusBeacon,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.beacon.set_busy(false);
    }
}

//! Request generations for single-slot state
//!
//! Every operation that writes a single slot takes a ticket before its backend call
//! and applies its result only if the ticket is still current when the response
//! lands. Reset paths invalidate outstanding tickets.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct Generation(AtomicU64);

impl Generation {
    /// Start a new request, superseding every earlier ticket
    pub(crate) fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Observe the counter without superseding anything
    pub(crate) fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn is_current(&self, ticket: u64) -> bool {
        self.0.load(Ordering::SeqCst) == ticket
    }

    /// Supersede every outstanding ticket without starting a request
    pub(crate) fn invalidate(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

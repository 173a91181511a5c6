//! Single-slot render scheduling.
//!
//! Any number of data or TF updates may arrive between two display refreshes;
//! only one render should follow them. [`RenderScheduler`] holds one pending
//! flag: the first [`request`](RenderScheduler::request) arms it, later ones
//! are folded into it, and the tick that [`take`](RenderScheduler::take)s it
//! does the work.

use tracing::trace;

#[derive(Debug, Default)]
pub struct RenderScheduler {
    pending: bool,
    /// Requests absorbed by an already-armed slot.
    coalesced: u64,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a render on the next tick. Returns `true` only if this call
    /// armed the slot.
    pub fn request(&mut self) -> bool {
        if self.pending {
            self.coalesced += 1;
            trace!(coalesced = self.coalesced, "render already pending");
            false
        } else {
            self.pending = true;
            true
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the slot. Returns `true` if a render was pending.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    /// Total requests that did not arm the slot because it was already armed.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_arms_slot() {
        let mut s = RenderScheduler::new();
        assert!(!s.is_pending());
        assert!(s.request());
        assert!(s.is_pending());
    }

    #[test]
    fn burst_of_requests_yields_one_render() {
        let mut s = RenderScheduler::new();
        let armed = (0..10).filter(|_| s.request()).count();
        assert_eq!(armed, 1);
        assert_eq!(s.coalesced(), 9);

        assert!(s.take());
        assert!(!s.take(), "slot must be empty after it was consumed");
    }

    #[test]
    fn slot_rearms_after_tick() {
        let mut s = RenderScheduler::new();
        s.request();
        s.take();
        assert!(s.request());
        assert!(s.take());
    }
}

//! Commands recorded while a resource is not ready yet.

/// Pending command slot of a session.
///
/// Holds at most one play request and at most one seek target. Both are
/// replayed exactly once when the resource reports it is prepared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeferredIntent {
    pub pending_play: bool,
    pub pending_seek_ms: Option<u64>,
}

impl DeferredIntent {
    /// Record a play request. Idempotent.
    pub fn record_play(&mut self) {
        self.pending_play = true;
    }

    /// Record a seek target, replacing any earlier one.
    pub fn record_seek(&mut self, position_ms: u64) {
        self.pending_seek_ms = Some(position_ms);
    }

    /// Drop a pending play request, keeping any pending seek.
    pub fn cancel_play(&mut self) {
        self.pending_play = false;
    }

    pub fn take_play(&mut self) -> bool {
        std::mem::take(&mut self.pending_play)
    }

    pub fn take_seek(&mut self) -> Option<u64> {
        self.pending_seek_ms.take()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        !self.pending_play && self.pending_seek_ms.is_none()
    }
}

//! Connection-limit admission.
//!
//! A slot is taken before the upgrade and held for the whole session, so
//! concurrent handshakes cannot overshoot the limit.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Connection slots; `0` means unlimited.
#[derive(Debug)]
pub struct Admission {
    limit: usize,
    slots: Option<Arc<Semaphore>>,
}

/// A held connection slot. Released on drop.
#[derive(Debug)]
pub struct Slot {
    _permit: Option<OwnedSemaphorePermit>,
}

impl Admission {
    /// Create admission control for at most `limit` sessions.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            slots: (limit > 0).then(|| Arc::new(Semaphore::new(limit))),
        }
    }

    /// Configured limit (0 = unlimited).
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Take a slot without waiting; `None` when the limit is reached.
    pub fn try_admit(&self) -> Option<Slot> {
        match &self.slots {
            None => Some(Slot { _permit: None }),
            Some(slots) => Arc::clone(slots)
                .try_acquire_owned()
                .ok()
                .map(|permit| Slot {
                    _permit: Some(permit),
                }),
        }
    }

    /// Free slots, or `None` when unlimited.
    pub fn available(&self) -> Option<usize> {
        self.slots.as_ref().map(|s| s.available_permits())
    }
}

//! Latest-value pose slot shared between a pose producer and its consumers.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::{Arc, Condvar, Mutex},
    time::Duration
};

use super::{LocError, Pose, PoseSource};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Producer side of the pose slot.
///
/// Each call to [`PoseSlot::publish`] replaces the previously held pose and wakes any waiting
/// subscribers. Cloning the slot gives another handle to the same storage.
#[derive(Clone, Default)]
pub struct PoseSlot {
    shared: Arc<Shared>
}

/// Consumer side of the pose slot, implements [`PoseSource`].
///
/// A subscriber remembers the sequence number of the last pose it returned, so every successful
/// `sample` returns a pose which was published after the previous one.
#[derive(Clone)]
pub struct PoseSubscriber {
    shared: Arc<Shared>,
    last_seq: u64
}

#[derive(Default)]
struct Shared {
    state: Mutex<SlotState>,
    cond: Condvar
}

#[derive(Default)]
struct SlotState {
    pose: Option<Pose>,

    /// Incremented on every publish, 0 means nothing has been published yet
    seq: u64,

    closed: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PoseSlot {
    /// Create a new, empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new pose, replacing any pose not yet consumed.
    pub fn publish(&self, pose: Pose) -> Result<(), LocError> {
        let mut state = self.shared.state.lock().map_err(|_| LocError::Poisoned)?;
        state.pose = Some(pose);
        state.seq += 1;
        self.shared.cond.notify_all();
        Ok(())
    }

    /// Close the slot. Waiting and future subscribers will get [`LocError::SourceClosed`] once
    /// they have consumed the last published pose.
    pub fn close(&self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.closed = true;
        }
        self.shared.cond.notify_all();
    }

    /// Get the latest published pose without waiting.
    pub fn latest(&self) -> Option<Pose> {
        self.shared.state.lock().ok().and_then(|s| s.pose)
    }

    /// Create a subscriber which will only see poses published from now on.
    pub fn subscribe(&self) -> PoseSubscriber {
        let last_seq = self.shared.state
            .lock()
            .map(|s| s.seq)
            .unwrap_or(0);

        PoseSubscriber {
            shared: self.shared.clone(),
            last_seq
        }
    }
}

impl PoseSource for PoseSubscriber {
    fn sample(&mut self, timeout: Duration) -> Result<Pose, LocError> {
        let last_seq = self.last_seq;

        let state = self.shared.state.lock().map_err(|_| LocError::Poisoned)?;
        let (state, wait_result) = self.shared.cond
            .wait_timeout_while(state, timeout, |s| s.seq <= last_seq && !s.closed)
            .map_err(|_| LocError::Poisoned)?;

        if state.seq > last_seq {
            if let Some(pose) = state.pose {
                self.last_seq = state.seq;
                return Ok(pose)
            }
        }

        if state.closed {
            Err(LocError::SourceClosed)
        }
        else {
            debug_assert!(wait_result.timed_out());
            Err(LocError::Timeout(timeout))
        }
    }
}

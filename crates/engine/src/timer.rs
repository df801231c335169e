//! In-process deadline cache.
//!
//! The persisted `timer_ends_at` is the source of truth; this is the fast
//! path that decides when to attempt resolution. Once a deadline fires the
//! timer stays disarmed (the processing guard) until someone sets a new
//! deadline or clears it, so a slow resolution is not re-triggered by the
//! next tick.

use parking_lot::Mutex;
use types::Timestamp;

#[derive(Debug, Default)]
struct TimerState {
    deadline: Option<Timestamp>,
    processing: bool,
}

#[derive(Debug, Default)]
pub struct AuctionTimer {
    state: Mutex<TimerState>,
}

impl AuctionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer. Clears the processing guard.
    pub fn set(&self, deadline: Timestamp) {
        let mut state = self.state.lock();
        state.deadline = Some(deadline);
        state.processing = false;
    }

    /// Disarm the timer. Clears the processing guard.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.deadline = None;
        state.processing = false;
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.state.lock().deadline
    }

    pub fn is_processing(&self) -> bool {
        self.state.lock().processing
    }

    /// Fire at most once per armed deadline.
    ///
    /// Returns `true` if the deadline has passed at `now`; the deadline is
    /// dropped and the processing guard raised in the same critical section.
    pub fn take_expired(&self, now: Timestamp) -> bool {
        let mut state = self.state.lock();
        if state.processing {
            return false;
        }
        match state.deadline {
            Some(deadline) if deadline <= now => {
                state.deadline = None;
                state.processing = true;
                true
            }
            _ => false,
        }
    }
}

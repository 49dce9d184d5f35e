//! Bounded history of odometry states.
//!
//! Each entry pairs the raw odometer pose with the pose of the filter
//! state at the same instant. The newest entry defines the current
//! correspondence between the odometer frame and the map frame; older
//! entries age out of a fixed-capacity ring.

use std::collections::VecDeque;

use super::rigid::Rigid3;

/// One (time, odometer pose, state pose) correspondence.
#[derive(Clone, Debug)]
pub struct OdometryState {
    /// Timestamp in microseconds.
    pub timestamp_us: u64,
    /// Pose reported by the wheel odometer (orientation already replaced
    /// by the gravity-aligned estimate upstream).
    pub odometer_pose: Rigid3,
    /// Pose of the trajectory state at the same time.
    pub state_pose: Rigid3,
}

/// Fixed-capacity ring buffer of odometry states.
#[derive(Clone, Debug)]
pub struct OdometryStateTracker {
    states: VecDeque<OdometryState>,
    capacity: usize,
}

impl OdometryStateTracker {
    /// Create a tracker holding at most `capacity` states.
    pub fn new(capacity: usize) -> Self {
        Self {
            states: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a state, evicting the oldest when at capacity.
    pub fn add_state(&mut self, state: OdometryState) {
        if self.states.len() == self.capacity {
            self.states.pop_front();
        }
        self.states.push_back(state);
    }

    /// The most recent state.
    ///
    /// # Panics
    ///
    /// Panics when the tracker is empty; check [`is_empty`](Self::is_empty)
    /// first.
    pub fn newest(&self) -> &OdometryState {
        self.states
            .back()
            .expect("odometry state tracker queried while empty")
    }

    /// True when no state has been recorded yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of stored states.
    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }
}

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use super::setpoint::{ControlSetpoint, SetpointCell};
use super::status::{ErrorCounter, LinkStatus};
use crate::actuator::ServoCommand;
use crate::sensor::{AttitudeEstimate, SensorSample};

/// Fields guarded by the store's mutex.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateSnapshot {
    pub sample: SensorSample,
    pub attitude: AttitudeEstimate,
    pub servo: ServoCommand,
    /// Number of attitude publications so far.
    pub sensor_updates: u64,
}

/// Handle to the state shared by the sensor, control and telemetry tasks
/// and the link loop. Cloning shares the same store.
///
/// Access is bounded: `try_lock` gives up after `timeout` and the caller
/// skips its read or write for that cycle.
#[derive(Clone, Default)]
pub struct SharedState {
    state: Arc<Mutex<StateSnapshot>>,
    setpoint: Arc<SetpointCell>,
    errors: Arc<ErrorCounter>,
    link: Arc<LinkStatus>,
    loop_count: Arc<AtomicU32>,
    lock_timeouts: Arc<AtomicU64>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_setpoint(initial: ControlSetpoint) -> Self {
        Self {
            setpoint: Arc::new(SetpointCell::new(initial)),
            ..Self::default()
        }
    }

    pub fn try_lock(&self, timeout: Duration) -> Option<MutexGuard<'_, StateSnapshot>> {
        let guard = self.state.try_lock_for(timeout);
        if guard.is_none() {
            self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
        }
        guard
    }

    /// Applies `f` under the lock. Returns false if the lock timed out and
    /// nothing was written.
    pub fn try_update<F>(&self, timeout: Duration, f: F) -> bool
    where
        F: FnOnce(&mut StateSnapshot),
    {
        match self.try_lock(timeout) {
            Some(mut guard) => {
                f(&mut *guard);
                true
            }
            None => false,
        }
    }

    pub fn try_read(&self, timeout: Duration) -> Option<StateSnapshot> {
        self.try_lock(timeout).map(|guard| *guard)
    }

    pub fn setpoint(&self) -> &SetpointCell {
        &self.setpoint
    }

    pub fn errors(&self) -> &ErrorCounter {
        &self.errors
    }

    pub fn link(&self) -> &LinkStatus {
        &self.link
    }

    pub fn increment_loop_count(&self) -> u32 {
        self.loop_count.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count.load(Ordering::Relaxed)
    }

    pub fn lock_timeouts(&self) -> u64 {
        self.lock_timeouts.load(Ordering::Relaxed)
    }
}

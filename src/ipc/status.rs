use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU8, Ordering};

/// Reported RSSI while the link is down.
pub const RSSI_DISCONNECTED: i8 = -100;

/// Task error count that sticks at `u8::MAX` instead of wrapping.
#[derive(Debug, Default)]
pub struct ErrorCounter(AtomicU8);

impl ErrorCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) -> u8 {
        let prev = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_add(1)))
            .unwrap_or(u8::MAX);
        prev.saturating_add(1)
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_saturated(&self) -> bool {
        self.get() == u8::MAX
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

/// Connection state published by the link loop for the telemetry task.
#[derive(Debug)]
pub struct LinkStatus {
    connected: AtomicBool,
    rssi: AtomicI8,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            connected: AtomicBool::new(false),
            rssi: AtomicI8::new(RSSI_DISCONNECTED),
        }
    }
}

impl LinkStatus {
    pub fn update(&self, connected: bool, rssi: Option<i8>) {
        self.rssi
            .store(rssi.unwrap_or(RSSI_DISCONNECTED), Ordering::Relaxed);
        self.connected.store(connected, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Last signal strength in dBm, or the sentinel when disconnected.
    pub fn rssi(&self) -> i8 {
        if self.is_connected() {
            self.rssi.load(Ordering::Relaxed)
        } else {
            RSSI_DISCONNECTED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_counter_saturates() {
        let counter = ErrorCounter::new();
        for _ in 0..300 {
            counter.increment();
        }
        assert_eq!(counter.get(), 255);
        assert!(counter.is_saturated());
        assert_eq!(counter.increment(), 255);
        counter.reset();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn rssi_sentinel_when_disconnected() {
        let link = LinkStatus::default();
        assert_eq!(link.rssi(), RSSI_DISCONNECTED);
        link.update(true, Some(-61));
        assert_eq!(link.rssi(), -61);
        link.update(false, Some(-61));
        assert_eq!(link.rssi(), RSSI_DISCONNECTED);
    }
}

use std::time::{Duration, Instant};

/// Monotonic time since boot, shared by every component that stamps data.
#[derive(Debug, Clone, Copy)]
pub struct Uptime {
    boot: Instant,
}

impl Uptime {
    pub fn start() -> Self {
        Self { boot: Instant::now() }
    }

    pub fn since(boot: Instant) -> Self {
        Self { boot }
    }

    pub fn elapsed(&self) -> Duration {
        self.boot.elapsed()
    }

    /// Milliseconds since boot, wrapping like a 32-bit tick counter.
    pub fn millis(&self) -> u32 {
        self.elapsed().as_millis() as u32
    }
}

impl Default for Uptime {
    fn default() -> Self {
        Self::start()
    }
}

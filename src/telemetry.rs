//! Telemetry module - builds the periodic status frame sent to the ground

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Uptime;
use crate::ipc::StateSnapshot;
use crate::protocol::TelemetryFrame;
use crate::scheduler::TaskStats;

/// Reported when no CPU load figure is available for this frame.
pub const CPU_LOAD_UNAVAILABLE: u8 = 0xFF;

const CPU_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// SYSTEM PROBE
// ============================================================================

/// Platform facts the telemetry frame reports.
pub trait SystemProbe: Send {
    /// Free memory in bytes, saturated to `u32`.
    fn free_memory(&self) -> u32;
}

/// Reads `MemAvailable` from `/proc/meminfo`. Reports 0 where that file
/// does not exist.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl SystemProbe for HostProbe {
    fn free_memory(&self) -> u32 {
        std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|text| parse_mem_available(&text))
            .map_or(0, |bytes| bytes.min(u32::MAX as u64) as u32)
    }
}

/// Fixed value, for tests and benches.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub u32);

impl SystemProbe for FixedProbe {
    fn free_memory(&self) -> u32 {
        self.0
    }
}

fn parse_mem_available(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find(|line| line.starts_with("MemAvailable:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb.saturating_mul(1024))
}

// ============================================================================
// CPU LOAD
// ============================================================================

/// Share of wall time the periodic tasks spent inside their cycle bodies.
/// Produces a new figure at most once per second.
pub struct CpuLoadEstimator {
    tasks: Vec<Arc<TaskStats>>,
    last: Option<(Instant, Duration)>,
}

impl CpuLoadEstimator {
    pub fn new(tasks: Vec<Arc<TaskStats>>) -> Self {
        Self { tasks, last: None }
    }

    fn busy(&self) -> Duration {
        self.tasks.iter().map(|t| t.busy()).sum()
    }

    pub fn sample(&mut self) -> u8 {
        self.sample_at(Instant::now())
    }

    /// Returns load in percent, or `CPU_LOAD_UNAVAILABLE` if less than a
    /// second has passed since the last figure.
    pub fn sample_at(&mut self, now: Instant) -> u8 {
        let busy = self.busy();
        match self.last {
            None => {
                self.last = Some((now, busy));
                CPU_LOAD_UNAVAILABLE
            }
            Some((at, _)) if now.saturating_duration_since(at) < CPU_SAMPLE_INTERVAL => CPU_LOAD_UNAVAILABLE,
            Some((at, prev_busy)) => {
                let wall = now.saturating_duration_since(at).as_secs_f64();
                let used = busy.saturating_sub(prev_busy).as_secs_f64();
                self.last = Some((now, busy));
                ((used / wall) * 100.0).round().clamp(0.0, 100.0) as u8
            }
        }
    }
}

// ============================================================================
// COLLECTOR
// ============================================================================

/// Link and health figures that live outside the state snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkHealth {
    pub rssi: i8,
    pub task_errors: u8,
}

pub struct TelemetryCollector {
    uptime: Uptime,
    probe: Box<dyn SystemProbe>,
    cpu: CpuLoadEstimator,
}

impl TelemetryCollector {
    pub fn new(uptime: Uptime, probe: Box<dyn SystemProbe>, cpu: CpuLoadEstimator) -> Self {
        Self { uptime, probe, cpu }
    }

    pub fn collect(&mut self, snapshot: &StateSnapshot, loop_count: u32, health: LinkHealth) -> TelemetryFrame {
        TelemetryFrame {
            timestamp_ms: self.uptime.millis(),
            pitch: snapshot.attitude.pitch_deg(),
            roll: snapshot.attitude.roll_deg(),
            yaw: snapshot.attitude.yaw_deg(),
            servo_pitch: snapshot.servo.pitch,
            servo_roll: snapshot.servo.roll,
            free_heap: self.probe.free_memory(),
            cpu_load: self.cpu.sample(),
            rssi: health.rssi,
            task_errors: health.task_errors,
            loop_count,
        }
    }
}

//! Scheduler module - fixed-rate periodic tasks on named threads

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::Deserialize;

use crate::metrics::TimingMetrics;

// ============================================================================
// OVERRUN POLICY
// ============================================================================

/// What the timer does when a cycle finishes after its next slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrunPolicy {
    /// Wake immediately, once per missed slot, until back on the grid.
    #[default]
    CatchUp,
    /// Drop the missed slots and wait for the next one after now.
    Skip,
}

// ============================================================================
// FIXED-RATE TIMER
// ============================================================================

/// Outcome of one `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Slot the next cycle starts at. May already be in the past.
    pub wake_at: Instant,
    pub overrun: bool,
    pub skipped: u64,
}

/// Wakes at `base + N * period`. Wake times never depend on how long a
/// cycle took, so lateness does not accumulate.
#[derive(Debug, Clone)]
pub struct FixedRateTimer {
    period: Duration,
    next: Instant,
    policy: OverrunPolicy,
}

impl FixedRateTimer {
    pub fn new(period: Duration, policy: OverrunPolicy) -> Self {
        Self::starting_at(Instant::now(), period, policy)
    }

    /// First slot is one period after `base`.
    pub fn starting_at(base: Instant, period: Duration, policy: OverrunPolicy) -> Self {
        let period = period.max(Duration::from_nanos(1));
        Self {
            period,
            next: base + period,
            policy,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_slot(&self) -> Instant {
        self.next
    }

    /// Picks the slot for the next cycle given the current time.
    pub fn advance(&mut self, now: Instant) -> Tick {
        let deadline = self.next;
        if now <= deadline {
            self.next = deadline + self.period;
            return Tick {
                wake_at: deadline,
                overrun: false,
                skipped: 0,
            };
        }

        match self.policy {
            OverrunPolicy::CatchUp => {
                self.next = deadline + self.period;
                Tick {
                    wake_at: deadline,
                    overrun: true,
                    skipped: 0,
                }
            }
            OverrunPolicy::Skip => {
                let behind = now - deadline;
                let missed = (behind.as_nanos() / self.period.as_nanos() + 1).min(u32::MAX as u128) as u32;
                let wake_at = deadline + self.period * missed;
                self.next = wake_at + self.period;
                Tick {
                    wake_at,
                    overrun: true,
                    skipped: missed as u64,
                }
            }
        }
    }

    /// Blocks until the next slot. Returns at once if it has already passed.
    pub fn wait(&mut self) -> Tick {
        let tick = self.advance(Instant::now());
        let now = Instant::now();
        if tick.wake_at > now {
            thread::sleep(tick.wake_at - now);
        }
        tick
    }
}

// ============================================================================
// TASK METADATA AND STATS
// ============================================================================

pub const SENSOR_PRIORITY: u8 = 2;
pub const CONTROL_PRIORITY: u8 = 4;
pub const TELEMETRY_PRIORITY: u8 = 1;
pub const LINK_PRIORITY: u8 = 1;

/// Static description of a periodic task. Priority and core are recorded
/// and logged; the host build runs every task on a plain OS thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: &'static str,
    pub period: Duration,
    pub priority: u8,
    pub core: Option<usize>,
}

#[derive(Debug, Default)]
pub struct TaskStats {
    pub cycles: AtomicU64,
    pub overruns: AtomicU64,
    pub skipped: AtomicU64,
    pub lock_timeouts: AtomicU64,
    /// Total time spent inside cycle bodies.
    pub busy_ns: AtomicU64,
}

impl TaskStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn lock_timeouts(&self) -> u64 {
        self.lock_timeouts.load(Ordering::Relaxed)
    }

    pub fn busy(&self) -> Duration {
        Duration::from_nanos(self.busy_ns.load(Ordering::Relaxed))
    }

    pub fn record_lock_timeout(&self) {
        self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }
}

/// Stop flag shared by every task of one system.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Runs `body` once per slot on a named thread until `shutdown` fires.
pub fn spawn_periodic<F>(
    spec: TaskSpec,
    policy: OverrunPolicy,
    stats: Arc<TaskStats>,
    metrics: TimingMetrics,
    shutdown: Shutdown,
    mut body: F,
) -> io::Result<thread::JoinHandle<()>>
where
    F: FnMut() + Send + 'static,
{
    info!(
        "[SCHED] Spawning {} task: period {:?}, priority {}, core {}",
        spec.name,
        spec.period,
        spec.priority,
        spec.core.map_or_else(|| "any".to_string(), |c| c.to_string())
    );

    thread::Builder::new().name(spec.name.to_string()).spawn(move || {
        let mut timer = FixedRateTimer::new(spec.period, policy);
        let mut last_start: Option<Instant> = None;

        while !shutdown.is_triggered() {
            let cycle_start = Instant::now();
            if let Some(prev) = last_start {
                metrics.record_cycle_jitter((cycle_start - prev).as_nanos() as u64);
            }
            last_start = Some(cycle_start);

            body();

            let busy = cycle_start.elapsed();
            metrics.record_processing(busy);
            stats.busy_ns.fetch_add(busy.as_nanos() as u64, Ordering::Relaxed);
            stats.cycles.fetch_add(1, Ordering::Relaxed);

            let tick = timer.wait();
            if tick.overrun {
                stats.overruns.fetch_add(1, Ordering::Relaxed);
                stats.skipped.fetch_add(tick.skipped, Ordering::Relaxed);
                debug!("[SCHED] {} overran its slot ({} skipped)", spec.name, tick.skipped);
            }
        }
        debug!("[SCHED] {} task stopped", spec.name);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(10);

    #[test]
    fn on_time_cycles_follow_the_grid() {
        let base = Instant::now();
        let mut timer = FixedRateTimer::starting_at(base, PERIOD, OverrunPolicy::CatchUp);
        for n in 1..=5u32 {
            // finish somewhere inside the slot
            let now = base + PERIOD * (n - 1) + Duration::from_millis(3);
            let tick = timer.advance(now);
            assert_eq!(tick.wake_at, base + PERIOD * n);
            assert!(!tick.overrun);
        }
    }

    #[test]
    fn jitter_does_not_accumulate() {
        let base = Instant::now();
        let mut timer = FixedRateTimer::starting_at(base, PERIOD, OverrunPolicy::CatchUp);
        let jitters = [0u64, 7, 2, 9, 1, 5, 8, 3, 6, 4];
        let mut wake = base;
        for (n, j) in jitters.iter().enumerate() {
            let now = wake + Duration::from_millis(*j) / 10;
            wake = timer.advance(now).wake_at;
            assert_eq!(wake, base + PERIOD * (n as u32 + 1));
        }
    }

    #[test]
    fn catch_up_fires_once_per_missed_slot() {
        let base = Instant::now();
        let mut timer = FixedRateTimer::starting_at(base, PERIOD, OverrunPolicy::CatchUp);

        // First cycle runs 35 ms: slots at 10, 20 and 30 are already gone
        let late = base + Duration::from_millis(35);
        let first = timer.advance(late);
        assert!(first.overrun);
        assert_eq!(first.wake_at, base + PERIOD);
        assert!(first.wake_at <= late);

        let second = timer.advance(late);
        assert!(second.overrun);
        assert_eq!(second.wake_at, base + PERIOD * 2);

        let third = timer.advance(late);
        assert_eq!(third.wake_at, base + PERIOD * 3);

        let fourth = timer.advance(late);
        assert!(!fourth.overrun);
        assert_eq!(fourth.wake_at, base + PERIOD * 4);
    }

    #[test]
    fn skip_realigns_to_next_slot() {
        let base = Instant::now();
        let mut timer = FixedRateTimer::starting_at(base, PERIOD, OverrunPolicy::Skip);

        let late = base + Duration::from_millis(35);
        let tick = timer.advance(late);
        assert!(tick.overrun);
        assert_eq!(tick.skipped, 3);
        assert_eq!(tick.wake_at, base + PERIOD * 4);
        assert!(tick.wake_at > late);

        let next = timer.advance(base + Duration::from_millis(42));
        assert!(!next.overrun);
        assert_eq!(next.wake_at, base + PERIOD * 5);
    }

    #[test]
    fn exact_slot_is_not_an_overrun() {
        let base = Instant::now();
        let mut timer = FixedRateTimer::starting_at(base, PERIOD, OverrunPolicy::Skip);
        let tick = timer.advance(base + PERIOD);
        assert!(!tick.overrun);
        assert_eq!(tick.wake_at, base + PERIOD);
    }

    #[test]
    fn overrun_policy_names() {
        #[derive(Deserialize)]
        struct Doc {
            policy: OverrunPolicy,
        }
        let doc: Doc = toml::from_str("policy = \"catch_up\"").unwrap();
        assert_eq!(doc.policy, OverrunPolicy::CatchUp);
        let doc: Doc = toml::from_str("policy = \"skip\"").unwrap();
        assert_eq!(doc.policy, OverrunPolicy::Skip);
    }

    #[test]
    fn periodic_task_runs_until_shutdown() {
        let stats = TaskStats::new();
        let shutdown = Shutdown::new();
        let counter = Arc::new(AtomicU64::new(0));
        let c = counter.clone();
        let spec = TaskSpec {
            name: "test-periodic",
            period: Duration::from_millis(2),
            priority: 1,
            core: None,
        };
        let handle = spawn_periodic(
            spec,
            OverrunPolicy::CatchUp,
            stats.clone(),
            TimingMetrics::new(),
            shutdown.clone(),
            move || {
                c.fetch_add(1, Ordering::Relaxed);
            },
        )
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        shutdown.trigger();
        handle.join().unwrap();

        let runs = counter.load(Ordering::Relaxed);
        assert!(runs >= 5, "only {} cycles ran", runs);
        assert_eq!(stats.cycles(), runs);
    }
}

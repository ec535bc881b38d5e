use std::io;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::ipc::{LinkChannels, SharedState};
use crate::metrics::TaskMonitor;
use crate::protocol::{self, Message, TelemetryFrame};
use crate::scheduler::{spawn_periodic, OverrunPolicy, Shutdown, TaskSpec};
use crate::telemetry::{LinkHealth, TelemetryCollector};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryCycle {
    Queued(TelemetryFrame),
    Disconnected,
    LockTimeout,
    OutboxFull,
}

/// Snapshots the shared state and queues an encoded telemetry frame for
/// the link loop. Nothing is produced while the link is down.
pub struct TelemetryTask {
    collector: TelemetryCollector,
    shared: SharedState,
    channels: LinkChannels,
    monitor: TaskMonitor,
    lock_timeout: Duration,
}

impl TelemetryTask {
    pub fn new(
        collector: TelemetryCollector,
        shared: SharedState,
        channels: LinkChannels,
        monitor: TaskMonitor,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            collector,
            shared,
            channels,
            monitor,
            lock_timeout,
        }
    }

    pub fn cycle(&mut self) -> TelemetryCycle {
        let link = self.shared.link();
        if !link.is_connected() {
            return TelemetryCycle::Disconnected;
        }

        let wait_start = Instant::now();
        let snapshot = self.shared.try_read(self.lock_timeout);
        self.monitor.metrics.record_lock_wait(wait_start.elapsed(), snapshot.is_some());
        let Some(snapshot) = snapshot else {
            self.monitor.stats.record_lock_timeout();
            debug!("[Task:Telemetry] Shared state busy, frame skipped");
            return TelemetryCycle::LockTimeout;
        };

        let health = LinkHealth {
            rssi: link.rssi(),
            task_errors: self.shared.errors().get(),
        };
        let frame = self.collector.collect(&snapshot, self.shared.loop_count(), health);

        if self.channels.push_outbound(protocol::encode(&Message::Telemetry(frame))) {
            TelemetryCycle::Queued(frame)
        } else {
            debug!("[Task:Telemetry] Outbox full, frame dropped");
            TelemetryCycle::OutboxFull
        }
    }
}

pub fn spawn_telemetry_task(
    spec: TaskSpec,
    policy: OverrunPolicy,
    mut task: TelemetryTask,
    shutdown: Shutdown,
) -> io::Result<thread::JoinHandle<()>> {
    let monitor = task.monitor.clone();
    spawn_periodic(spec, policy, monitor.stats, monitor.metrics, shutdown, move || {
        task.cycle();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Uptime;
    use crate::ipc::RSSI_DISCONNECTED;
    use crate::telemetry::{CpuLoadEstimator, FixedProbe};

    fn task(shared: SharedState, channels: LinkChannels) -> TelemetryTask {
        let collector = TelemetryCollector::new(
            Uptime::start(),
            Box::new(FixedProbe(4096)),
            CpuLoadEstimator::new(Vec::new()),
        );
        TelemetryTask::new(
            collector,
            shared,
            channels,
            TaskMonitor::new("telemetry-test"),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn nothing_is_sent_while_disconnected() {
        let shared = SharedState::new();
        let channels = LinkChannels::new(4);
        let mut task = task(shared, channels.clone());
        assert_eq!(task.cycle(), TelemetryCycle::Disconnected);
        assert!(channels.outbox_rx.is_empty());
    }

    #[test]
    fn queued_frame_decodes_with_current_state() {
        let shared = SharedState::new();
        shared.link().update(true, Some(-58));
        shared.errors().increment();
        shared.increment_loop_count();
        shared.try_update(Duration::from_millis(5), |s| s.servo.pitch = 7.5);
        let channels = LinkChannels::new(4);
        let mut task = task(shared, channels.clone());

        assert!(matches!(task.cycle(), TelemetryCycle::Queued(_)));
        let bytes = channels.outbox_rx.try_recv().unwrap();
        match protocol::decode(&bytes).unwrap() {
            Message::Telemetry(frame) => {
                assert_eq!(frame.servo_pitch, 7.5);
                assert_eq!(frame.rssi, -58);
                assert_ne!(frame.rssi, RSSI_DISCONNECTED);
                assert_eq!(frame.task_errors, 1);
                assert_eq!(frame.loop_count, 1);
                assert_eq!(frame.free_heap, 4096);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn full_outbox_drops_frames() {
        let shared = SharedState::new();
        shared.link().update(true, Some(-60));
        let channels = LinkChannels::new(1);
        let mut task = task(shared, channels);
        assert!(matches!(task.cycle(), TelemetryCycle::Queued(_)));
        assert_eq!(task.cycle(), TelemetryCycle::OutboxFull);
    }
}

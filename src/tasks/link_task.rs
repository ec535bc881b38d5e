use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::clock::Uptime;
use crate::ipc::{ControlSetpoint, LinkChannels, SharedState};
use crate::metrics::TaskMonitor;
use crate::protocol::{self, HeartbeatFrame, Message, PidUpdateCommand, SystemStatus};
use crate::scheduler::{spawn_periodic, OverrunPolicy, Shutdown, TaskSpec};
use crate::transport::Transport;

#[derive(Debug, Default)]
pub struct LinkStats {
    pub sent: AtomicU64,
    pub received: AtomicU64,
    pub rejected: AtomicU64,
    pub dropped: AtomicU64,
    pub reconnects: AtomicU64,
}

impl LinkStats {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}

fn gains_are_finite(update: &PidUpdateCommand) -> bool {
    [update.kp, update.ki, update.kd, update.integral_min, update.integral_max]
        .iter()
        .all(|v| v.is_finite())
}

/// Best-effort link loop: services the transport, dispatches inbound
/// commands, flushes queued telemetry and keeps the heartbeat going.
pub struct LinkService<T> {
    transport: T,
    shared: SharedState,
    channels: LinkChannels,
    uptime: Uptime,
    heartbeat_interval: Duration,
    last_heartbeat: Option<Instant>,
    was_connected: bool,
    ever_connected: bool,
    stats: Arc<LinkStats>,
}

impl<T: Transport> LinkService<T> {
    pub fn new(
        transport: T,
        shared: SharedState,
        channels: LinkChannels,
        uptime: Uptime,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            transport,
            shared,
            channels,
            uptime,
            heartbeat_interval,
            last_heartbeat: None,
            was_connected: false,
            ever_connected: false,
            stats: Arc::new(LinkStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<LinkStats> {
        self.stats.clone()
    }

    pub fn poll(&mut self) {
        let frames = self.transport.poll_once();
        let connected = self.transport.is_connected();
        self.shared.link().update(connected, self.transport.rssi());

        if connected && !self.was_connected {
            if self.ever_connected {
                self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
            }
            self.ever_connected = true;
            info!("[LINK] Link up");
            self.send_heartbeat();
        } else if !connected && self.was_connected {
            warn!("[LINK] Link down, telemetry suppressed");
        }
        self.was_connected = connected;

        for frame in frames {
            self.stats.received.fetch_add(1, Ordering::Relaxed);
            match protocol::decode(&frame) {
                Ok(message) => self.dispatch(message),
                Err(err) => {
                    self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!("[LINK] Discarding {} byte frame: {}", frame.len(), err);
                }
            }
        }

        self.flush_outbox(connected);

        let heartbeat_due = self
            .last_heartbeat
            .map_or(true, |at| at.elapsed() >= self.heartbeat_interval);
        if connected && heartbeat_due {
            self.send_heartbeat();
        }
    }

    pub fn dispatch(&mut self, message: Message) {
        match message {
            Message::Control(cmd) => {
                if !(cmd.target_pitch.is_finite() && cmd.target_roll.is_finite()) {
                    warn!("[LINK] Ignoring non-finite control targets");
                    return;
                }
                self.shared.setpoint().store(ControlSetpoint {
                    pitch: cmd.target_pitch,
                    roll: cmd.target_roll,
                });
                info!(
                    "[LINK] Control: target pitch={:.2}, roll={:.2}",
                    cmd.target_pitch, cmd.target_roll
                );
            }
            Message::PidUpdate(update) => {
                if !gains_are_finite(&update) {
                    warn!("[LINK] Ignoring non-finite {} gain update", update.axis);
                    return;
                }
                info!(
                    "[LINK] PID update {}: Kp={:.3}, Ki={:.3}, Kd={:.3}",
                    update.axis, update.kp, update.ki, update.kd
                );
                if !self.channels.forward_gains(update) {
                    warn!("[LINK] Gain queue full, {} update dropped", update.axis);
                }
            }
            Message::Heartbeat(hb) => {
                debug!("[LINK] Peer heartbeat at {} ms, status {:?}", hb.timestamp_ms, hb.status);
            }
            Message::Telemetry(_) | Message::Ack => {
                debug!("[LINK] Ignoring inbound {:?}", message.message_type());
            }
        }
    }

    fn send_frame(&mut self, frame: &[u8]) -> bool {
        match self.transport.send(frame) {
            Ok(()) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(err) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("[LINK] Send failed: {}", err);
                false
            }
        }
    }

    fn send_heartbeat(&mut self) {
        let status = SystemStatus::from_error_count(self.shared.errors().get());
        let frame = protocol::encode(&Message::Heartbeat(HeartbeatFrame {
            timestamp_ms: self.uptime.millis(),
            status,
        }));
        self.last_heartbeat = Some(Instant::now());
        if self.send_frame(&frame) {
            debug!("[LINK] Heartbeat sent ({:?})", status);
        }
    }

    fn flush_outbox(&mut self, connected: bool) {
        let pending: Vec<Vec<u8>> = self.channels.outbox_rx.try_iter().collect();
        for frame in pending {
            if connected {
                self.send_frame(&frame);
            } else {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

pub fn spawn_link_task<T>(
    spec: TaskSpec,
    policy: OverrunPolicy,
    mut service: LinkService<T>,
    monitor: TaskMonitor,
    shutdown: Shutdown,
) -> io::Result<thread::JoinHandle<()>>
where
    T: Transport + 'static,
{
    spawn_periodic(spec, policy, monitor.stats, monitor.metrics, shutdown, move || {
        service.poll();
    })
}

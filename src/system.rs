//! Boot sequence and task wiring.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use crate::actuator::{PidController, ServoActuator};
use crate::clock::Uptime;
use crate::config::GimbalConfig;
use crate::error::BootError;
use crate::ipc::{LinkChannels, SharedState};
use crate::metrics::TaskMonitor;
use crate::sensor::{BusConfig, CalibratedSensor, CalibrationOffsets, ComplementaryFilter, SensorDriver};
use crate::scheduler::Shutdown;
use crate::tasks::{self, ControlTask, LinkService, LinkStats, SensorTask, TelemetryTask};
use crate::telemetry::{CpuLoadEstimator, HostProbe, SystemProbe, TelemetryCollector};
use crate::transport::Transport;

/// A running stabilizer: four periodic tasks around one shared state.
pub struct GimbalSystem {
    shared: SharedState,
    shutdown: Shutdown,
    handles: Vec<thread::JoinHandle<()>>,
    monitors: Vec<TaskMonitor>,
    link_stats: Arc<LinkStats>,
    calibration: CalibrationOffsets,
    uptime: Uptime,
}

impl GimbalSystem {
    /// Brings up the peripherals in order and starts every task.
    /// Sensor, servo or thread failures abort the boot; a transport that
    /// cannot connect yet does not.
    pub fn boot<D, S, T>(config: &GimbalConfig, sensor: D, servo: S, transport: T) -> Result<Self, BootError>
    where
        D: SensorDriver + 'static,
        S: ServoActuator + 'static,
        T: Transport + 'static,
    {
        Self::boot_with_probe(config, sensor, servo, transport, Box::new(HostProbe))
    }

    pub fn boot_with_probe<D, S, T>(
        config: &GimbalConfig,
        sensor: D,
        mut servo: S,
        mut transport: T,
        probe: Box<dyn SystemProbe>,
    ) -> Result<Self, BootError>
    where
        D: SensorDriver + 'static,
        S: ServoActuator + 'static,
        T: Transport + 'static,
    {
        let uptime = Uptime::start();

        info!("[Setup] Initializing IMU...");
        let mut sensor = CalibratedSensor::new(sensor);
        sensor.begin(&BusConfig::from(&config.sensor))?;

        info!("[Setup] Calibrating sensor (keep gimbal stationary)...");
        let spacing = Duration::from_millis(config.sensor.calibration_sample_delay_ms);
        let calibration = match sensor.calibrate(config.sensor.calibration_samples, spacing) {
            Ok(offsets) => offsets,
            Err(err) => {
                warn!("[Setup] Calibration failed, using zero offsets: {}", err);
                CalibrationOffsets::default()
            }
        };

        info!("[Setup] Initializing servos...");
        servo.begin()?;

        let link = &config.link;
        if let Err(err) = transport.connect(&link.host, link.port, &link.path) {
            warn!("[Setup] Link not up yet ({}), continuing", err);
        }

        let shared = SharedState::new();
        let channels = LinkChannels::new(link.outbox_capacity);
        let shutdown = Shutdown::new();
        let cfg = &config.tasks;

        let sensor_monitor = TaskMonitor::new(tasks::SENSOR_TASK);
        let control_monitor = TaskMonitor::new(tasks::CONTROL_TASK);
        let telemetry_monitor = TaskMonitor::new(tasks::TELEMETRY_TASK);
        let link_monitor = TaskMonitor::new(tasks::LINK_TASK);

        let sensor_task = SensorTask::new(
            sensor,
            ComplementaryFilter::new(config.filter.alpha),
            shared.clone(),
            sensor_monitor.clone(),
            Duration::from_millis(cfg.sensor_lock_timeout_ms),
        );
        let control_task = ControlTask::new(
            PidController::from_config(&config.pid.pitch),
            PidController::from_config(&config.pid.roll),
            servo,
            shared.clone(),
            channels.clone(),
            control_monitor.clone(),
            Duration::from_millis(cfg.control_lock_timeout_ms),
        );
        let cpu = CpuLoadEstimator::new(vec![
            sensor_monitor.stats.clone(),
            control_monitor.stats.clone(),
            telemetry_monitor.stats.clone(),
        ]);
        let telemetry_task = TelemetryTask::new(
            TelemetryCollector::new(uptime, probe, cpu),
            shared.clone(),
            channels.clone(),
            telemetry_monitor.clone(),
            Duration::from_millis(cfg.telemetry_lock_timeout_ms),
        );
        let link_service = LinkService::new(
            transport,
            shared.clone(),
            channels,
            uptime,
            Duration::from_millis(link.heartbeat_interval_ms),
        );
        let link_stats = link_service.stats();

        let mut system = GimbalSystem {
            shared,
            shutdown: shutdown.clone(),
            handles: Vec::with_capacity(4),
            monitors: vec![
                sensor_monitor,
                control_monitor,
                telemetry_monitor,
                link_monitor.clone(),
            ],
            link_stats,
            calibration,
            uptime,
        };

        info!("[Setup] Creating tasks...");
        // An early return drops `system`, which stops the tasks already running
        let policy = cfg.overrun_policy;
        let handle = tasks::spawn_sensor_task(tasks::sensor_spec(cfg.sensor_period()), policy, sensor_task, shutdown.clone())
            .map_err(|source| BootError::Spawn { task: tasks::SENSOR_TASK, source })?;
        system.handles.push(handle);

        let handle = tasks::spawn_control_task(tasks::control_spec(cfg.control_period()), policy, control_task, shutdown.clone())
            .map_err(|source| BootError::Spawn { task: tasks::CONTROL_TASK, source })?;
        system.handles.push(handle);

        let handle = tasks::spawn_telemetry_task(
            tasks::telemetry_spec(cfg.telemetry_period()),
            policy,
            telemetry_task,
            shutdown.clone(),
        )
        .map_err(|source| BootError::Spawn { task: tasks::TELEMETRY_TASK, source })?;
        system.handles.push(handle);

        let handle = tasks::spawn_link_task(tasks::link_spec(cfg.link_poll()), policy, link_service, link_monitor, shutdown)
            .map_err(|source| BootError::Spawn { task: tasks::LINK_TASK, source })?;
        system.handles.push(handle);

        info!("[Setup] System initialization complete");
        Ok(system)
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub fn monitors(&self) -> &[TaskMonitor] {
        &self.monitors
    }

    pub fn monitor(&self, name: &str) -> Option<&TaskMonitor> {
        self.monitors.iter().find(|m| m.name == name)
    }

    pub fn link_stats(&self) -> Arc<LinkStats> {
        self.link_stats.clone()
    }

    pub fn calibration(&self) -> CalibrationOffsets {
        self.calibration
    }

    pub fn uptime(&self) -> Uptime {
        self.uptime
    }

    fn stop(&mut self) {
        self.shutdown.trigger();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("[SYSTEM] A task panicked");
            }
        }
    }

    /// Stops every task and waits for them.
    pub fn shutdown(mut self) {
        info!("[SYSTEM] Shutting down");
        self.stop();
    }

    pub fn print_report(&self) {
        let stats = &self.link_stats;
        println!("\n=== Stabilizer Results ===");
        println!("Uptime: {:?}", self.uptime.elapsed());
        println!("Control loops: {}", self.shared.loop_count());
        println!("Task errors: {}", self.shared.errors().get());
        println!("Shared-state lock timeouts: {}", self.shared.lock_timeouts());
        println!(
            "Link: {} sent, {} received, {} rejected, {} dropped, {} reconnects",
            stats.sent(),
            stats.received(),
            stats.rejected(),
            stats.dropped(),
            stats.reconnects()
        );
        println!("\n=== Task Metrics ===");
        for monitor in &self.monitors {
            monitor.print_summary();
        }
    }
}

impl Drop for GimbalSystem {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Parks the caller forever after a fatal boot error.
pub fn halt() -> ! {
    error!("[SYSTEM] Halted");
    loop {
        thread::sleep(Duration::from_secs(1));
    }
}

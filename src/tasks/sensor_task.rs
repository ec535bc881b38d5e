use std::io;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::ipc::SharedState;
use crate::metrics::TaskMonitor;
use crate::scheduler::{spawn_periodic, OverrunPolicy, Shutdown, TaskSpec};
use crate::sensor::{AttitudeEstimate, CalibratedSensor, ComplementaryFilter, SensorDriver};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorCycle {
    Published(AttitudeEstimate),
    ReadFailed,
    LockTimeout,
}

/// Reads the IMU, runs the complementary filter and publishes the result.
pub struct SensorTask<D> {
    sensor: CalibratedSensor<D>,
    filter: ComplementaryFilter,
    shared: SharedState,
    monitor: TaskMonitor,
    lock_timeout: Duration,
    last_read: Instant,
}

impl<D: SensorDriver> SensorTask<D> {
    pub fn new(
        sensor: CalibratedSensor<D>,
        filter: ComplementaryFilter,
        shared: SharedState,
        monitor: TaskMonitor,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            sensor,
            filter,
            shared,
            monitor,
            lock_timeout,
            last_read: Instant::now(),
        }
    }

    pub fn cycle(&mut self) -> SensorCycle {
        let sample = match self.sensor.read_calibrated_sample() {
            Ok(sample) => sample,
            Err(err) => {
                warn!("[Task:Sensor] Failed to read sensor data: {}", err);
                self.shared.errors().increment();
                return SensorCycle::ReadFailed;
            }
        };

        // dt spans back to the last good read, so skipped cycles widen it
        let now = Instant::now();
        let dt = now.duration_since(self.last_read).as_secs_f32();
        self.last_read = now;

        let attitude = self.filter.update_sample(&sample, dt);

        let wait_start = Instant::now();
        let published = self.shared.try_update(self.lock_timeout, |state| {
            state.sample = sample;
            state.attitude = attitude;
            state.sensor_updates += 1;
        });
        self.monitor.metrics.record_lock_wait(wait_start.elapsed(), published);

        if published {
            SensorCycle::Published(attitude)
        } else {
            self.monitor.stats.record_lock_timeout();
            debug!("[Task:Sensor] Shared state busy, attitude not published");
            SensorCycle::LockTimeout
        }
    }

    pub fn filter(&self) -> &ComplementaryFilter {
        &self.filter
    }
}

pub fn spawn_sensor_task<D>(
    spec: TaskSpec,
    policy: OverrunPolicy,
    mut task: SensorTask<D>,
    shutdown: Shutdown,
) -> io::Result<thread::JoinHandle<()>>
where
    D: SensorDriver + 'static,
{
    let monitor = task.monitor.clone();
    spawn_periodic(spec, policy, monitor.stats, monitor.metrics, shutdown, move || {
        task.cycle();
    })
}

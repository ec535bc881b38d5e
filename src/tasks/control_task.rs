use std::io;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::actuator::{Axis, PidController, ServoActuator, ServoCommand};
use crate::ipc::{LinkChannels, SharedState};
use crate::metrics::TaskMonitor;
use crate::protocol::PidUpdateCommand;
use crate::scheduler::{spawn_periodic, OverrunPolicy, Shutdown, TaskSpec};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCycle {
    Actuated { command: ServoCommand, loop_count: u32 },
    LockTimeout,
}

/// Runs both axis PIDs against the latest attitude and drives the servos.
/// Sole owner of the controllers; gain changes arrive over `LinkChannels`.
pub struct ControlTask<S> {
    pitch_pid: PidController,
    roll_pid: PidController,
    servo: S,
    shared: SharedState,
    channels: LinkChannels,
    monitor: TaskMonitor,
    lock_timeout: Duration,
    last_compute: Instant,
}

impl<S: ServoActuator> ControlTask<S> {
    pub fn new(
        pitch_pid: PidController,
        roll_pid: PidController,
        servo: S,
        shared: SharedState,
        channels: LinkChannels,
        monitor: TaskMonitor,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            pitch_pid,
            roll_pid,
            servo,
            shared,
            channels,
            monitor,
            lock_timeout,
            last_compute: Instant::now(),
        }
    }

    pub fn pid(&self, axis: Axis) -> &PidController {
        match axis {
            Axis::Pitch => &self.pitch_pid,
            Axis::Roll => &self.roll_pid,
        }
    }

    fn pid_mut(&mut self, axis: Axis) -> &mut PidController {
        match axis {
            Axis::Pitch => &mut self.pitch_pid,
            Axis::Roll => &mut self.roll_pid,
        }
    }

    fn apply_gain_update(&mut self, update: PidUpdateCommand) {
        info!(
            "[Task:Control] {} gains: Kp={:.3}, Ki={:.3}, Kd={:.3}, integral [{:.1}, {:.1}]",
            update.axis, update.kp, update.ki, update.kd, update.integral_min, update.integral_max
        );
        let pid = self.pid_mut(update.axis);
        pid.set_gains(update.kp, update.ki, update.kd);
        pid.set_integral_limits(update.integral_min, update.integral_max);
    }

    pub fn cycle(&mut self) -> ControlCycle {
        for update in self.channels.drain_gains() {
            self.apply_gain_update(update);
        }

        let wait_start = Instant::now();
        let snapshot = self.shared.try_read(self.lock_timeout);
        self.monitor.metrics.record_lock_wait(wait_start.elapsed(), snapshot.is_some());
        let Some(snapshot) = snapshot else {
            self.monitor.stats.record_lock_timeout();
            debug!("[Task:Control] Shared state busy, cycle skipped");
            return ControlCycle::LockTimeout;
        };

        let now = Instant::now();
        let dt = now.duration_since(self.last_compute).as_secs_f32();
        self.last_compute = now;

        let setpoint = self.shared.setpoint().load();
        let pitch_out = self.pitch_pid.compute(setpoint.pitch, snapshot.attitude.pitch_deg(), dt);
        let roll_out = self.roll_pid.compute(setpoint.roll, snapshot.attitude.roll_deg(), dt);

        let command = ServoCommand {
            pitch: self.servo.set_angle(Axis::Pitch, pitch_out),
            roll: self.servo.set_angle(Axis::Roll, roll_out),
        };

        // Mirror for telemetry; a missed mirror is picked up next cycle
        let wait_start = Instant::now();
        let mirrored = self.shared.try_update(self.lock_timeout, |state| state.servo = command);
        self.monitor.metrics.record_lock_wait(wait_start.elapsed(), mirrored);
        if !mirrored {
            self.monitor.stats.record_lock_timeout();
            debug!("[Task:Control] Shared state busy, servo mirror skipped");
        }

        let loop_count = self.shared.increment_loop_count();
        ControlCycle::Actuated { command, loop_count }
    }
}

pub fn spawn_control_task<S>(
    spec: TaskSpec,
    policy: OverrunPolicy,
    mut task: ControlTask<S>,
    shutdown: Shutdown,
) -> io::Result<thread::JoinHandle<()>>
where
    S: ServoActuator + 'static,
{
    let monitor = task.monitor.clone();
    spawn_periodic(spec, policy, monitor.stats, monitor.metrics, shutdown, move || {
        task.cycle();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{RecordingPwm, ServoController};
    use crate::config::ServoConfig;
    use crate::ipc::ControlSetpoint;

    fn task(shared: SharedState, channels: LinkChannels) -> (ControlTask<ServoController<RecordingPwm>>, RecordingPwm) {
        let pwm = RecordingPwm::new();
        let mut servo = ServoController::new(pwm.clone(), &ServoConfig::default());
        servo.begin().unwrap();
        let task = ControlTask::new(
            PidController::new(1.0, 0.0, 0.0, -90.0, 90.0),
            PidController::new(1.0, 0.0, 0.0, -90.0, 90.0),
            servo,
            shared,
            channels,
            TaskMonitor::new("control-test"),
            Duration::from_millis(5),
        );
        (task, pwm)
    }

    #[test]
    fn proportional_output_reaches_the_servo() {
        let shared = SharedState::with_setpoint(ControlSetpoint { pitch: 10.0, roll: -20.0 });
        let (mut task, pwm) = task(shared.clone(), LinkChannels::new(4));

        match task.cycle() {
            ControlCycle::Actuated { command, loop_count } => {
                assert!((command.pitch - 10.0).abs() < 1e-4);
                assert!((command.roll + 20.0).abs() < 1e-4);
                assert_eq!(loop_count, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        let snap = shared.try_read(Duration::from_millis(5)).unwrap();
        assert!((snap.servo.pitch - 10.0).abs() < 1e-4);
        assert_ne!(pwm.duty(Axis::Pitch), 4915);
    }

    #[test]
    fn output_is_clamped_to_servo_range() {
        let shared = SharedState::with_setpoint(ControlSetpoint { pitch: 500.0, roll: 0.0 });
        let (mut task, _pwm) = task(shared, LinkChannels::new(4));
        match task.cycle() {
            ControlCycle::Actuated { command, .. } => assert_eq!(command.pitch, 90.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn gain_updates_are_applied_before_compute() {
        let shared = SharedState::with_setpoint(ControlSetpoint { pitch: 10.0, roll: 0.0 });
        let channels = LinkChannels::new(4);
        let (mut task, _pwm) = task(shared, channels.clone());

        channels.forward_gains(PidUpdateCommand {
            axis: Axis::Pitch,
            kp: 2.0,
            ki: 0.0,
            kd: 0.0,
            integral_min: -3.0,
            integral_max: 3.0,
        });
        match task.cycle() {
            ControlCycle::Actuated { command, .. } => assert!((command.pitch - 20.0).abs() < 1e-4),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(task.pid(Axis::Pitch).gains().kp, 2.0);
        assert_eq!(task.pid(Axis::Pitch).integral_limits(), (-3.0, 3.0));
        assert_eq!(task.pid(Axis::Roll).gains().kp, 1.0);
    }

    #[test]
    fn loop_count_increases_every_cycle() {
        let shared = SharedState::new();
        let (mut task, _pwm) = task(shared.clone(), LinkChannels::new(4));
        for _ in 0..5 {
            task.cycle();
        }
        assert_eq!(shared.loop_count(), 5);
    }
}

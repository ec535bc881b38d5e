use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use log::{error, info};

mod args;

use args::Args;
use gimbal_stabilizer::actuator::{Axis, RecordingPwm, ServoController};
use gimbal_stabilizer::config::{load_config, read_config};
use gimbal_stabilizer::protocol::{ControlCommand, Message, PidUpdateCommand};
use gimbal_stabilizer::sensor::SimulatedImu;
use gimbal_stabilizer::transport::{LoopbackTransport, OperatorLink};
use gimbal_stabilizer::{halt, GimbalSystem};

/// Setpoints the simulated ground station cycles through.
const SCRIPT: [(f32, f32); 4] = [(10.0, 0.0), (-10.0, 5.0), (0.0, -15.0), (0.0, 0.0)];
const SCRIPT_STEP: Duration = Duration::from_secs(2);

/// Plays the ground-station side until `duration` has passed. Returns the
/// number of telemetry frames received.
fn run_operator(operator: &OperatorLink, duration: Duration) -> u64 {
    let start = Instant::now();
    let mut next_step = start;
    let mut step = 0usize;
    let mut telemetry = 0u64;
    let mut gains_sent = false;
    let mut last_print = start;

    while start.elapsed() < duration {
        let now = Instant::now();
        if now >= next_step {
            let (pitch, roll) = SCRIPT[step % SCRIPT.len()];
            info!("[OPERATOR] Target pitch={:.1}, roll={:.1}", pitch, roll);
            operator.send(&Message::Control(ControlCommand { target_pitch: pitch, target_roll: roll }));
            step += 1;
            next_step += SCRIPT_STEP;
        }
        if !gains_sent && start.elapsed() >= Duration::from_secs(3) {
            operator.send(&Message::PidUpdate(PidUpdateCommand {
                axis: Axis::Roll,
                kp: 1.2,
                ki: 0.0,
                kd: 0.0,
                integral_min: -10.0,
                integral_max: 10.0,
            }));
            gains_sent = true;
        }

        if let Some(frame) = operator.recv_timeout(Duration::from_millis(50)) {
            if let Ok(Message::Telemetry(t)) = gimbal_stabilizer::protocol::decode(&frame) {
                telemetry += 1;
                if last_print.elapsed() >= Duration::from_secs(1) {
                    last_print = Instant::now();
                    println!(
                        "[Attitude] Pitch: {:6.2}°  Roll: {:6.2}°  Servo: {:6.2}° / {:6.2}°  loops={} cpu={}",
                        t.pitch, t.roll, t.servo_pitch, t.servo_roll, t.loop_count, t.cpu_load
                    );
                }
            }
        }
    }
    telemetry
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    println!("==============================================");
    println!("Gimbal Stabilizer");
    println!("==============================================\n");

    let config = if args.strict {
        read_config(&args.config).with_context(|| format!("loading {}", args.config.display()))?
    } else {
        load_config(&args.config)
    };

    let imu = SimulatedImu::new(args.seed);
    let pwm = RecordingPwm::new();
    let servo = ServoController::new(pwm.clone(), &config.servo);
    let (transport, operator) = LoopbackTransport::pair();

    let system = match GimbalSystem::boot(&config, imu, servo, transport) {
        Ok(system) => system,
        Err(err) if args.no_halt => return Err(err).context("boot failed"),
        Err(err) => {
            error!("[Setup] FATAL: {}", err);
            halt();
        }
    };

    println!("System running for {} seconds...\n", args.duration_secs);
    let frames = run_operator(&operator, Duration::from_secs(args.duration_secs));

    system.print_report();
    println!("Telemetry frames received by operator: {}", frames);
    println!("PWM writes: {}", pwm.writes());
    system.shutdown();
    Ok(())
}

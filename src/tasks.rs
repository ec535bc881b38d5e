//! Periodic tasks of the stabilizer. Each task is a plain struct whose
//! `cycle` does one iteration; `spawn_*` runs it on the scheduler.

pub mod control_task;
pub mod link_task;
pub mod sensor_task;
pub mod telemetry_task;

use std::time::Duration;

use crate::scheduler::{TaskSpec, CONTROL_PRIORITY, LINK_PRIORITY, SENSOR_PRIORITY, TELEMETRY_PRIORITY};

pub const SENSOR_TASK: &str = "SensorTask";
pub const CONTROL_TASK: &str = "ControlTask";
pub const TELEMETRY_TASK: &str = "TelemetryTask";
pub const LINK_TASK: &str = "LinkTask";

pub fn sensor_spec(period: Duration) -> TaskSpec {
    TaskSpec {
        name: SENSOR_TASK,
        period,
        priority: SENSOR_PRIORITY,
        core: Some(0),
    }
}

pub fn control_spec(period: Duration) -> TaskSpec {
    TaskSpec {
        name: CONTROL_TASK,
        period,
        priority: CONTROL_PRIORITY,
        core: Some(1),
    }
}

pub fn telemetry_spec(period: Duration) -> TaskSpec {
    TaskSpec {
        name: TELEMETRY_TASK,
        period,
        priority: TELEMETRY_PRIORITY,
        core: Some(1),
    }
}

pub fn link_spec(poll: Duration) -> TaskSpec {
    TaskSpec {
        name: LINK_TASK,
        period: poll,
        priority: LINK_PRIORITY,
        core: None,
    }
}

pub use control_task::{spawn_control_task, ControlCycle, ControlTask};
pub use link_task::{spawn_link_task, LinkService, LinkStats};
pub use sensor_task::{spawn_sensor_task, SensorCycle, SensorTask};
pub use telemetry_task::{spawn_telemetry_task, TelemetryCycle, TelemetryTask};

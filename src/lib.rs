pub mod actuator;
pub mod clock;
pub mod config;
pub mod error;
pub mod ipc;
pub mod metrics;
pub mod protocol;
pub mod scheduler;
pub mod sensor;
pub mod system;
pub mod tasks;
pub mod telemetry;
pub mod transport;

pub use config::GimbalConfig;
pub use error::BootError;
pub use system::{halt, GimbalSystem};

//! IPC module - state shared between the periodic tasks and the link loop

pub mod channels;
pub mod setpoint;
pub mod shared_state;
pub mod status;

pub use channels::LinkChannels;
pub use setpoint::{ControlSetpoint, SetpointCell};
pub use shared_state::{SharedState, StateSnapshot};
pub use status::{ErrorCounter, LinkStatus, RSSI_DISCONNECTED};

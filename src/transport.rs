//! Transport module - framed binary link to the ground station

pub mod loopback;

use crate::error::TransportError;

/// Message-oriented link carrying whole protocol frames.
///
/// `poll_once` services the connection and hands back every frame received
/// since the previous call. Reconnection after a drop is the transport's own
/// business; callers only look at `is_connected`.
pub trait Transport: Send {
    fn connect(&mut self, host: &str, port: u16, path: &str) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    fn poll_once(&mut self) -> Vec<Vec<u8>>;

    /// Signal strength in dBm, if the link reports one.
    fn rssi(&self) -> Option<i8>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, host: &str, port: u16, path: &str) -> Result<(), TransportError> {
        (**self).connect(host, port, path)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).send(frame)
    }

    fn poll_once(&mut self) -> Vec<Vec<u8>> {
        (**self).poll_once()
    }

    fn rssi(&self) -> Option<i8> {
        (**self).rssi()
    }
}

pub fn endpoint_url(host: &str, port: u16, path: &str) -> String {
    if path.starts_with('/') {
        format!("ws://{}:{}{}", host, port, path)
    } else {
        format!("ws://{}:{}/{}", host, port, path)
    }
}

pub use loopback::{LoopbackTransport, OperatorLink};

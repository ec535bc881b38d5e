use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{info, warn};
use parking_lot::Mutex;

use super::{endpoint_url, Transport};
use crate::error::{ProtocolError, TransportError};
use crate::protocol::{self, Message};

/// Link state both ends can see.
struct LinkState {
    /// Whether the operator end is reachable.
    online: AtomicBool,
    connected: AtomicBool,
    rssi: AtomicI8,
    reconnects: AtomicU64,
    endpoint: Mutex<Option<String>>,
}

/// In-memory transport. Frames sent by the gimbal end show up at the paired
/// `OperatorLink` and vice versa.
pub struct LoopbackTransport {
    state: Arc<LinkState>,
    inbound: Receiver<Vec<u8>>,
    outbound: Sender<Vec<u8>>,
}

/// The ground-station side of a `LoopbackTransport`.
#[derive(Clone)]
pub struct OperatorLink {
    state: Arc<LinkState>,
    to_gimbal: Sender<Vec<u8>>,
    from_gimbal: Receiver<Vec<u8>>,
}

impl LoopbackTransport {
    pub fn pair() -> (LoopbackTransport, OperatorLink) {
        let state = Arc::new(LinkState {
            online: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            rssi: AtomicI8::new(-50),
            reconnects: AtomicU64::new(0),
            endpoint: Mutex::new(None),
        });
        let (to_gimbal, inbound) = unbounded();
        let (outbound, from_gimbal) = unbounded();

        (
            LoopbackTransport {
                state: state.clone(),
                inbound,
                outbound,
            },
            OperatorLink {
                state,
                to_gimbal,
                from_gimbal,
            },
        )
    }

    pub fn reconnects(&self) -> u64 {
        self.state.reconnects.load(Ordering::Relaxed)
    }
}

impl Transport for LoopbackTransport {
    fn connect(&mut self, host: &str, port: u16, path: &str) -> Result<(), TransportError> {
        let url = endpoint_url(host, port, path);
        *self.state.endpoint.lock() = Some(url.clone());

        if !self.state.online.load(Ordering::Acquire) {
            return Err(TransportError::ConnectFailed(url));
        }
        self.state.connected.store(true, Ordering::Release);
        info!("[LINK] Connected to {}", url);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.outbound
            .send(frame.to_vec())
            .map_err(|_| TransportError::SendFailed("operator end dropped".to_string()))
    }

    fn poll_once(&mut self) -> Vec<Vec<u8>> {
        let online = self.state.online.load(Ordering::Acquire);
        let connected = self.is_connected();

        if connected && !online {
            self.state.connected.store(false, Ordering::Release);
            warn!("[LINK] Disconnected");
        } else if !connected && online {
            // Only reconnect once an endpoint has been configured
            if let Some(url) = self.state.endpoint.lock().clone() {
                self.state.connected.store(true, Ordering::Release);
                self.state.reconnects.fetch_add(1, Ordering::Relaxed);
                info!("[LINK] Reconnected to {}", url);
            }
        }

        if !self.is_connected() {
            return Vec::new();
        }
        self.inbound.try_iter().collect()
    }

    fn rssi(&self) -> Option<i8> {
        if self.is_connected() {
            Some(self.state.rssi.load(Ordering::Relaxed))
        } else {
            None
        }
    }
}

impl OperatorLink {
    pub fn send(&self, message: &Message) {
        self.send_raw(protocol::encode(message));
    }

    /// Queues arbitrary bytes, valid frame or not.
    pub fn send_raw(&self, frame: Vec<u8>) {
        // The gimbal end owns the receiver for the lifetime of the pair
        let _ = self.to_gimbal.send(frame);
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.from_gimbal.recv_timeout(timeout).ok()
    }

    /// Decodes everything received so far.
    pub fn drain(&self) -> Vec<Result<Message, ProtocolError>> {
        self.from_gimbal.try_iter().map(|frame| protocol::decode(&frame)).collect()
    }

    /// Waits up to `timeout` for a frame that decodes and satisfies `pred`.
    pub fn wait_for<F>(&self, timeout: Duration, mut pred: F) -> Option<Message>
    where
        F: FnMut(&Message) -> bool,
    {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let frame = self.from_gimbal.recv_timeout(remaining).ok()?;
            if let Ok(message) = protocol::decode(&frame) {
                if pred(&message) {
                    return Some(message);
                }
            }
        }
    }

    /// Takes the operator end off the air. The gimbal notices on its next poll.
    pub fn go_offline(&self) {
        self.state.online.store(false, Ordering::Release);
    }

    pub fn go_online(&self) {
        self.state.online.store(true, Ordering::Release);
    }

    pub fn set_rssi(&self, dbm: i8) {
        self.state.rssi.store(dbm, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ControlCommand;

    #[test]
    fn frames_flow_both_ways_once_connected() {
        let (mut transport, operator) = LoopbackTransport::pair();
        assert!(transport.send(&[1, 2, 3]).is_err());

        transport.connect("localhost", 8887, "/esp32").unwrap();
        assert!(transport.is_connected());

        let cmd = Message::Control(ControlCommand { target_pitch: 4.0, target_roll: -1.0 });
        operator.send(&cmd);
        let frames = transport.poll_once();
        assert_eq!(frames.len(), 1);
        assert_eq!(protocol::decode(&frames[0]).unwrap(), cmd);

        transport.send(&protocol::encode(&Message::Ack)).unwrap();
        assert_eq!(operator.drain(), vec![Ok(Message::Ack)]);
    }

    #[test]
    fn connect_fails_while_offline_then_recovers_on_poll() {
        let (mut transport, operator) = LoopbackTransport::pair();
        operator.go_offline();
        assert!(matches!(
            transport.connect("10.0.0.1", 8887, "/esp32"),
            Err(TransportError::ConnectFailed(_))
        ));
        assert!(transport.poll_once().is_empty());
        assert!(!transport.is_connected());
        assert_eq!(transport.rssi(), None);

        operator.go_online();
        transport.poll_once();
        assert!(transport.is_connected());
        assert_eq!(transport.reconnects(), 1);
    }

    #[test]
    fn drop_is_noticed_on_poll() {
        let (mut transport, operator) = LoopbackTransport::pair();
        transport.connect("localhost", 8887, "/").unwrap();
        operator.set_rssi(-72);
        assert_eq!(transport.rssi(), Some(-72));

        operator.go_offline();
        transport.poll_once();
        assert!(!transport.is_connected());
        assert_eq!(transport.send(&[0]), Err(TransportError::NotConnected));
    }
}

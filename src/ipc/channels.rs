use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::Arc;

use crate::protocol::PidUpdateCommand;

/// Capacity of the gain-update queue. Updates arrive at operator speed, so a
/// handful of slots is plenty.
pub const GAIN_QUEUE_CAPACITY: usize = 8;

/// Queues between the link loop and the periodic tasks.
#[derive(Clone)]
pub struct LinkChannels {
    // Link -> Control (PID gain updates)
    pub gain_tx: Sender<PidUpdateCommand>,
    pub gain_rx: Arc<Receiver<PidUpdateCommand>>,

    // Telemetry -> Link (encoded frames)
    pub outbox_tx: Sender<Vec<u8>>,
    pub outbox_rx: Arc<Receiver<Vec<u8>>>,
}

impl LinkChannels {
    pub fn new(outbox_capacity: usize) -> Self {
        let (gain_tx, gain_rx) = bounded(GAIN_QUEUE_CAPACITY);
        let (outbox_tx, outbox_rx) = bounded(outbox_capacity.max(1));

        Self {
            gain_tx,
            gain_rx: Arc::new(gain_rx),
            outbox_tx,
            outbox_rx: Arc::new(outbox_rx),
        }
    }

    /// Queues a frame for the link loop. Returns false if the outbox is full
    /// and the frame was dropped.
    pub fn push_outbound(&self, frame: Vec<u8>) -> bool {
        match self.outbox_tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn forward_gains(&self, update: PidUpdateCommand) -> bool {
        self.gain_tx.try_send(update).is_ok()
    }

    /// Everything queued for the control task, oldest first.
    pub fn drain_gains(&self) -> Vec<PidUpdateCommand> {
        self.gain_rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Axis;

    #[test]
    fn outbox_drops_when_full() {
        let channels = LinkChannels::new(2);
        assert!(channels.push_outbound(vec![1]));
        assert!(channels.push_outbound(vec![2]));
        assert!(!channels.push_outbound(vec![3]));
        let frames: Vec<_> = channels.outbox_rx.try_iter().collect();
        assert_eq!(frames, vec![vec![1], vec![2]]);
    }

    #[test]
    fn gains_drain_in_order() {
        let channels = LinkChannels::new(4);
        for kp in [1.0, 2.0, 3.0] {
            assert!(channels.forward_gains(PidUpdateCommand {
                axis: Axis::Pitch,
                kp,
                ki: 0.0,
                kd: 0.0,
                integral_min: -10.0,
                integral_max: 10.0,
            }));
        }
        let drained: Vec<f32> = channels.drain_gains().iter().map(|u| u.kp).collect();
        assert_eq!(drained, vec![1.0, 2.0, 3.0]);
        assert!(channels.drain_gains().is_empty());
    }
}

use std::sync::atomic::{AtomicU32, Ordering};

/// Target attitude requested by the operator, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlSetpoint {
    pub pitch: f32,
    pub roll: f32,
}

/// `f32` stored as its bit pattern in an `AtomicU32`.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Lock-free setpoint slot: one writer (the link loop), any number of readers.
///
/// Each axis is individually atomic. A reader racing a write may see the
/// new pitch with the previous roll; the control loop tolerates that.
#[derive(Debug, Default)]
pub struct SetpointCell {
    pitch: AtomicF32,
    roll: AtomicF32,
}

impl SetpointCell {
    pub fn new(initial: ControlSetpoint) -> Self {
        Self {
            pitch: AtomicF32::new(initial.pitch),
            roll: AtomicF32::new(initial.roll),
        }
    }

    pub fn store(&self, setpoint: ControlSetpoint) {
        self.pitch.store(setpoint.pitch);
        self.roll.store(setpoint.roll);
    }

    pub fn load(&self) -> ControlSetpoint {
        ControlSetpoint {
            pitch: self.pitch.load(),
            roll: self.roll.load(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn store_then_load() {
        let cell = SetpointCell::default();
        assert_eq!(cell.load(), ControlSetpoint::default());
        cell.store(ControlSetpoint { pitch: 12.5, roll: -3.25 });
        assert_eq!(cell.load(), ControlSetpoint { pitch: 12.5, roll: -3.25 });
    }

    #[test]
    fn readers_never_see_torn_scalars() {
        let cell = Arc::new(SetpointCell::default());
        let writer = {
            let cell = cell.clone();
            thread::spawn(move || {
                for i in 0..10_000 {
                    let v = if i % 2 == 0 { 1.5 } else { -7.25 };
                    cell.store(ControlSetpoint { pitch: v, roll: v });
                }
            })
        };
        for _ in 0..10_000 {
            let sp = cell.load();
            assert!([0.0, 1.5, -7.25].contains(&sp.pitch));
            assert!([0.0, 1.5, -7.25].contains(&sp.roll));
        }
        writer.join().unwrap();
    }
}

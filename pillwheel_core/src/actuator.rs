//! Hopper servo cycles.
//!
//! One dispense is a closed → open → closed sweep with a settle pause after
//! every move. A servo that refuses a move does not stop the cycle: the
//! failure is logged, the move is treated as simulated, and the settle pause
//! still elapses so timing matches a working rig.
use crate::config::MotionCfg;
use crate::hw_error::map_hw_error;
use pillwheel_traits::{Clock, Servo};
use std::sync::Arc;

pub struct HopperActuator<V: Servo> {
    servo: V,
    clock: Arc<dyn Clock + Send + Sync>,
    motion: MotionCfg,
    simulated_moves: u64,
}

impl<V: Servo> core::fmt::Debug for HopperActuator<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HopperActuator")
            .field("motion", &self.motion)
            .field("simulated_moves", &self.simulated_moves)
            .finish()
    }
}

impl<V: Servo> HopperActuator<V> {
    pub fn new(servo: V, clock: Arc<dyn Clock + Send + Sync>, motion: MotionCfg) -> Self {
        Self {
            servo,
            clock,
            motion,
            simulated_moves: 0,
        }
    }

    pub fn motion(&self) -> &MotionCfg {
        &self.motion
    }

    /// Moves that fell back to simulation because the servo errored.
    pub fn simulated_moves(&self) -> u64 {
        self.simulated_moves
    }

    /// Sweep `channel` closed → open → closed. Safe to repeat.
    pub fn cycle(&mut self, channel: u8) {
        let (open, closed) = (self.motion.open_deg, self.motion.closed_deg);
        tracing::debug!(channel, "hopper cycle");
        for deg in [closed, open, closed] {
            self.move_to(channel, deg);
            self.clock.sleep(self.motion.settle());
        }
    }

    /// Close every given channel and stop driving it.
    pub fn park(&mut self, channels: &[u8]) {
        let closed = self.motion.closed_deg;
        for &ch in channels {
            self.move_to(ch, closed);
            if let Err(e) = self.servo.release(ch) {
                tracing::warn!(channel = ch, error = %map_hw_error(&*e), "servo release failed");
            }
        }
    }

    fn move_to(&mut self, channel: u8, degrees: f32) {
        if let Err(e) = self.servo.set_angle(channel, degrees) {
            let err = map_hw_error(&*e);
            if self.simulated_moves == 0 {
                tracing::warn!(channel, degrees, error = %err, "servo unavailable, simulating move");
            } else {
                tracing::debug!(channel, degrees, error = %err, "servo move simulated");
            }
            self.simulated_moves = self.simulated_moves.saturating_add(1);
        }
    }
}

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// A ranging sensor looking across the pill chute.
///
/// Readings are distances in millimeters. Implementations block for at most
/// `timeout` waiting for a measurement.
pub trait DistanceSensor {
    fn read_mm(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>>;
}

/// Positional servo outputs addressed by channel (one channel per hopper).
pub trait Servo {
    fn set_angle(
        &mut self,
        channel: u8,
        degrees: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Stop driving the channel (PWM off). Default: nothing to release.
    fn release(&mut self, _channel: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

impl<T: DistanceSensor + ?Sized> DistanceSensor for Box<T> {
    fn read_mm(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_mm(timeout)
    }
}

impl<T: Servo + ?Sized> Servo for Box<T> {
    fn set_angle(
        &mut self,
        channel: u8,
        degrees: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_angle(channel, degrees)
    }

    fn release(&mut self, channel: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).release(channel)
    }
}

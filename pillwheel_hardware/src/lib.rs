pub mod error;
#[cfg(feature = "hardware")]
pub mod pca9685;
pub mod util;
#[cfg(feature = "hardware")]
pub mod vl53l0x;

use pillwheel_traits::{DistanceSensor, Servo};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Resting distance reported by the simulated sensor, in millimeters.
pub const SIM_RESTING_MM: i32 = 150;
/// How far a simulated pill shortens the measured distance while it falls.
pub const SIM_DROP_DIP_MM: i32 = 12;

/// Shared state that couples a `SimulatedServo` with a `SimulatedSensor`.
///
/// Every servo move to a lower angle than the channel's last one releases one
/// simulated pill, so a closed→open→closed cycle drops exactly one whatever
/// the configured angles. The sensor then reports one shortened reading per
/// pill in flight. A jammed link swallows the pills so drop detection never
/// confirms anything.
#[derive(Debug, Clone, Default)]
pub struct SimLink {
    in_flight: Arc<AtomicU32>,
    jammed: Arc<AtomicBool>,
}

impl SimLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_jammed(&self, jammed: bool) {
        self.jammed.store(jammed, Ordering::Relaxed);
    }

    pub fn is_jammed(&self) -> bool {
        self.jammed.load(Ordering::Relaxed)
    }

    /// Pills released but not yet seen by the sensor.
    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::Relaxed)
    }

    fn release_pill(&self) {
        if !self.is_jammed() {
            self.in_flight.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn take_pill(&self) -> bool {
        self.in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Simulated ranging sensor: a constant resting distance, dipping briefly for
/// every pill released through the linked servo.
pub struct SimulatedSensor {
    resting_mm: i32,
    link: Option<SimLink>,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        SimulatedSensor {
            resting_mm: SIM_RESTING_MM,
            link: None,
        }
    }

    pub fn with_link(link: SimLink) -> Self {
        SimulatedSensor {
            resting_mm: SIM_RESTING_MM,
            link: Some(link),
        }
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceSensor for SimulatedSensor {
    fn read_mm(
        &mut self,
        _timeout: std::time::Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let falling = self.link.as_ref().is_some_and(SimLink::take_pill);
        let mm = if falling {
            self.resting_mm - SIM_DROP_DIP_MM
        } else {
            self.resting_mm
        };
        tracing::trace!(mm, falling, "distance (simulated)");
        Ok(mm)
    }
}

/// Simulated servo bank with 16 channels, mirroring a PCA9685 board.
pub struct SimulatedServo {
    angles: [f32; 16],
    link: Option<SimLink>,
}

impl SimulatedServo {
    pub fn new() -> Self {
        SimulatedServo {
            angles: [0.0; 16],
            link: None,
        }
    }

    pub fn with_link(link: SimLink) -> Self {
        SimulatedServo {
            angles: [0.0; 16],
            link: Some(link),
        }
    }

    /// Last commanded angle on `channel`, if the channel exists.
    pub fn angle(&self, channel: u8) -> Option<f32> {
        self.angles.get(usize::from(channel)).copied()
    }
}

impl Default for SimulatedServo {
    fn default() -> Self {
        Self::new()
    }
}

impl Servo for SimulatedServo {
    fn set_angle(
        &mut self,
        channel: u8,
        degrees: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let slot = self
            .angles
            .get_mut(usize::from(channel))
            .ok_or(error::HwError::InvalidChannel(channel))?;
        let closing = degrees < *slot;
        *slot = degrees;
        tracing::debug!(channel, degrees, "servo move (simulated)");
        if closing
            && let Some(link) = &self.link
        {
            link.release_pill();
        }
        Ok(())
    }
}

#[cfg(feature = "hardware")]
pub use hardware::{HardwareSensor, HardwareServo};

#[cfg(feature = "hardware")]
mod hardware {
    use crate::error::HwError;
    use crate::pca9685::Pca9685;
    use crate::vl53l0x::Vl53l0x;
    use pillwheel_traits::{DistanceSensor, Servo};

    /// VL53L0X time-of-flight sensor with bounded retry on timeouts.
    pub struct HardwareSensor {
        tof: Vl53l0x,
    }

    impl HardwareSensor {
        pub fn new(bus: u8, address: u16) -> Result<Self, HwError> {
            let tof = Vl53l0x::new(bus, address)?;
            Ok(HardwareSensor { tof })
        }
    }

    impl DistanceSensor for HardwareSensor {
        fn read_mm(
            &mut self,
            timeout: std::time::Duration,
        ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
            let mut attempts = 0;
            let max_attempts = 3;
            loop {
                match self.tof.read_range_mm(timeout) {
                    Ok(mm) => {
                        tracing::debug!(mm, "vl53l0x sample");
                        return Ok(i32::from(mm));
                    }
                    Err(HwError::DataReadyTimeout) if attempts < max_attempts => {
                        attempts += 1;
                        tracing::warn!(retries = attempts, "range timeout, retrying");
                    }
                    Err(e) => {
                        tracing::error!("Range read error: {}", e);
                        return Err(Box::new(e));
                    }
                }
            }
        }
    }

    /// Hobby servos driven through a PCA9685 PWM board.
    pub struct HardwareServo {
        pwm: Pca9685,
        min_pulse_us: u16,
        max_pulse_us: u16,
    }

    impl HardwareServo {
        pub fn new(
            bus: u8,
            address: u16,
            pwm_hz: u16,
            min_pulse_us: u16,
            max_pulse_us: u16,
        ) -> Result<Self, HwError> {
            let pwm = Pca9685::new(bus, address, pwm_hz)?;
            Ok(HardwareServo {
                pwm,
                min_pulse_us,
                max_pulse_us,
            })
        }
    }

    impl Servo for HardwareServo {
        fn set_angle(
            &mut self,
            channel: u8,
            degrees: f32,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let pulse =
                crate::util::angle_to_pulse_us(degrees, self.min_pulse_us, self.max_pulse_us);
            self.pwm.set_pulse_us(channel, pulse)?;
            Ok(())
        }

        fn release(&mut self, channel: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.pwm.full_off(channel)?;
            Ok(())
        }
    }
}

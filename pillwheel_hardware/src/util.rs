use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `ready` until it reports true, or fail with `DataReadyTimeout` once
/// `timeout` expires. Sleeps `poll_interval` between polls to avoid spinning;
/// errors from `ready` are returned as-is.
pub fn wait_until_ready_with_timeout(
    mut ready: impl FnMut() -> Result<bool>,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !ready()? {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Convert a servo angle into a PWM pulse width (microseconds), clamping the
/// angle to the servo's 0..=180 degree travel.
pub fn angle_to_pulse_us(degrees: f32, min_pulse_us: u16, max_pulse_us: u16) -> u16 {
    let deg = if degrees.is_finite() {
        degrees.clamp(0.0, 180.0)
    } else {
        0.0
    };
    let span = f32::from(max_pulse_us.saturating_sub(min_pulse_us));
    let pulse = f32::from(min_pulse_us) + span * (deg / 180.0);
    pulse.round() as u16
}

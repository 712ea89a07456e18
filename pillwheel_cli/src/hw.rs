//! Hardware assembly: real drivers when available, simulation otherwise.

use crate::cli::SIM_JAM_ENV;
use pillwheel_hardware::{SimLink, SimulatedSensor, SimulatedServo};
use pillwheel_traits::{DistanceSensor, Servo};
use pillwheel_ui::HardwareStatus;

pub struct Hardware {
    pub sensor: Box<dyn DistanceSensor + Send>,
    pub servo: Box<dyn Servo + Send>,
    pub status: HardwareStatus,
}

fn sim_link() -> SimLink {
    let link = SimLink::new();
    let jammed = std::env::var(SIM_JAM_ENV).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if jammed {
        tracing::info!("simulated hoppers jammed");
    }
    link.set_jammed(jammed);
    link
}

/// Open the servo driver and ranging sensor, falling back to simulation per device.
#[cfg(feature = "hardware")]
pub fn assemble(cfg: &pillwheel_config::Config) -> Hardware {
    let h = &cfg.hardware;
    let link = sim_link();

    let (servo, servos_ok): (Box<dyn Servo + Send>, bool) = match pillwheel_hardware::HardwareServo::new(
        h.i2c_bus,
        h.servo_driver_addr,
        h.servo_pwm_hz,
        h.servo_min_pulse_us,
        h.servo_max_pulse_us,
    ) {
        Ok(s) => {
            tracing::info!(addr = h.servo_driver_addr, "servo driver ready");
            (Box::new(s), true)
        }
        Err(e) => {
            tracing::warn!(error = %e, "servo driver unavailable; simulating servos");
            (Box::new(SimulatedServo::with_link(link.clone())), false)
        }
    };

    let (sensor, sensor_ok): (Box<dyn DistanceSensor + Send>, bool) =
        match pillwheel_hardware::HardwareSensor::new(h.i2c_bus, h.sensor_addr) {
            Ok(s) => {
                tracing::info!(addr = h.sensor_addr, "ranging sensor ready");
                (Box::new(s), true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "ranging sensor unavailable; simulating sensor");
                (Box::new(SimulatedSensor::with_link(link)), false)
            }
        };

    Hardware {
        sensor,
        servo,
        status: HardwareStatus {
            servos_ok,
            sensor_ok,
        },
    }
}

#[cfg(not(feature = "hardware"))]
pub fn assemble(_cfg: &pillwheel_config::Config) -> Hardware {
    let link = sim_link();
    Hardware {
        sensor: Box::new(SimulatedSensor::with_link(link.clone())),
        servo: Box::new(SimulatedServo::with_link(link)),
        status: HardwareStatus::default(),
    }
}

use rppal::i2c::I2c;
use std::time::Duration;
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::wait_until_ready_with_timeout;

const SYSRANGE_START: u8 = 0x00;
const SYSTEM_INTERRUPT_CLEAR: u8 = 0x0B;
const RESULT_INTERRUPT_STATUS: u8 = 0x13;
const RESULT_RANGE_STATUS: u8 = 0x14;
const IDENTIFICATION_MODEL_ID: u8 = 0xC0;
const MODEL_ID: u8 = 0xEE;

/// Minimal single-shot VL53L0X reader.
///
/// Relies on the sensor's power-on defaults; the vendor tuning sequence is not
/// replayed, so absolute accuracy is lower than with the full ST driver. The
/// dispenser only compares readings against a fresh baseline.
pub struct Vl53l0x {
    i2c: I2c,
}

fn i2c_err(e: rppal::i2c::Error) -> HwError {
    HwError::I2c(e.to_string())
}

impl Vl53l0x {
    pub fn new(bus: u8, address: u16) -> Result<Self> {
        let mut i2c = I2c::with_bus(bus).map_err(i2c_err)?;
        i2c.set_slave_address(address).map_err(i2c_err)?;
        let id = i2c
            .smbus_read_byte(IDENTIFICATION_MODEL_ID)
            .map_err(i2c_err)?;
        if id != MODEL_ID {
            return Err(HwError::I2c(format!(
                "unexpected model id 0x{id:02X} at 0x{address:02X}"
            )));
        }
        Ok(Self { i2c })
    }

    pub fn read_range_mm(&mut self, timeout: Duration) -> Result<u16> {
        self.i2c
            .smbus_write_byte(SYSRANGE_START, 0x01)
            .map_err(i2c_err)?;

        let i2c = &self.i2c;
        wait_until_ready_with_timeout(
            || {
                let status = i2c
                    .smbus_read_byte(RESULT_INTERRUPT_STATUS)
                    .map_err(i2c_err)?;
                Ok(status & 0x07 != 0)
            },
            timeout,
            Duration::from_millis(2),
        )?;

        let mut buf = [0u8; 2];
        self.i2c
            .write_read(&[RESULT_RANGE_STATUS + 10], &mut buf)
            .map_err(i2c_err)?;
        self.i2c
            .smbus_write_byte(SYSTEM_INTERRUPT_CLEAR, 0x01)
            .map_err(i2c_err)?;

        let mm = u16::from_be_bytes(buf);
        trace!(mm, "vl53l0x range");
        Ok(mm)
    }
}

use rppal::i2c::I2c;
use std::time::Duration;
use tracing::trace;

use crate::error::{HwError, Result};

const MODE1: u8 = 0x00;
const PRESCALE: u8 = 0xFE;
const LED0_ON_L: u8 = 0x06;

const MODE1_SLEEP: u8 = 0x10;
const MODE1_AI: u8 = 0x20;
const MODE1_RESTART: u8 = 0x80;

const OSC_HZ: u32 = 25_000_000;
const STEPS: u32 = 4096;
const FULL_OFF: u8 = 0x10;

pub struct Pca9685 {
    i2c: I2c,
    pwm_hz: u16,
}

fn i2c_err(e: rppal::i2c::Error) -> HwError {
    HwError::I2c(e.to_string())
}

impl Pca9685 {
    pub fn new(bus: u8, address: u16, pwm_hz: u16) -> Result<Self> {
        let mut i2c = I2c::with_bus(bus).map_err(i2c_err)?;
        i2c.set_slave_address(address).map_err(i2c_err)?;
        let mut dev = Self { i2c, pwm_hz };
        dev.set_frequency(pwm_hz)?;
        Ok(dev)
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<()> {
        self.i2c.write(&[reg, value]).map_err(i2c_err)?;
        Ok(())
    }

    /// Program the prescaler; the oscillator must sleep while it changes.
    pub fn set_frequency(&mut self, pwm_hz: u16) -> Result<()> {
        let hz = u32::from(pwm_hz.max(24));
        let prescale = (OSC_HZ + STEPS * hz / 2) / (STEPS * hz) - 1;
        let prescale = u8::try_from(prescale.clamp(3, 255)).unwrap_or(u8::MAX);
        self.write_reg(MODE1, MODE1_SLEEP)?;
        self.write_reg(PRESCALE, prescale)?;
        self.write_reg(MODE1, 0)?;
        std::thread::sleep(Duration::from_millis(5));
        self.write_reg(MODE1, MODE1_RESTART | MODE1_AI)?;
        self.pwm_hz = pwm_hz.max(24);
        trace!(prescale, pwm_hz = self.pwm_hz, "pca9685 frequency set");
        Ok(())
    }

    /// Drive `channel` with a pulse of `pulse_us` microseconds per period.
    pub fn set_pulse_us(&mut self, channel: u8, pulse_us: u16) -> Result<()> {
        if channel > 15 {
            return Err(HwError::InvalidChannel(channel));
        }
        let period_us = 1_000_000 / u32::from(self.pwm_hz);
        let off = (u32::from(pulse_us) * STEPS / period_us).min(STEPS - 1);
        let off = u16::try_from(off).unwrap_or(0x0FFF);
        let reg = LED0_ON_L + 4 * channel;
        let [off_l, off_h] = off.to_le_bytes();
        self.i2c
            .write(&[reg, 0, 0, off_l, off_h])
            .map_err(i2c_err)?;
        trace!(channel, pulse_us, off, "pca9685 pulse");
        Ok(())
    }

    /// Turn the channel fully off so the servo stops holding position.
    pub fn full_off(&mut self, channel: u8) -> Result<()> {
        if channel > 15 {
            return Err(HwError::InvalidChannel(channel));
        }
        let reg = LED0_ON_L + 4 * channel;
        self.i2c
            .write(&[reg, 0, 0, 0, FULL_OFF])
            .map_err(i2c_err)?;
        Ok(())
    }
}

#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and prescription parsing for the dispenser.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Prescription CSV loader enforces headers and row shape; whether the
//!   counts make a valid prescription is decided by the core at session start.
use serde::Deserialize;
use std::collections::HashSet;

/// Highest servo channel on a PCA9685 board.
pub const MAX_CHANNEL: u8 = 15;

/// Prescription CSV schema.
///
/// Expected headers:
/// label,channel,required
///
/// Example:
/// label,channel,required
/// Vitamin D,0,2
/// Vitamin C,1,1
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HopperCfg {
    pub label: String,
    pub channel: u8,
    pub required: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// I2C bus shared by the servo driver and the ranging sensor
    pub i2c_bus: u8,
    /// PCA9685 address
    pub servo_driver_addr: u16,
    /// Servo PWM frequency
    pub servo_pwm_hz: u16,
    pub servo_min_pulse_us: u16,
    pub servo_max_pulse_us: u16,
    /// VL53L0X address
    pub sensor_addr: u16,
    /// Max time to wait for a range measurement before failing the read
    pub sensor_read_timeout_ms: u64,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            i2c_bus: 1,
            servo_driver_addr: 0x40,
            servo_pwm_hz: 50,
            servo_min_pulse_us: 750,
            servo_max_pulse_us: 2250,
            sensor_addr: 0x29,
            sensor_read_timeout_ms: 150,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Motion {
    pub open_deg: f32,
    pub closed_deg: f32,
    /// Pause after every servo move
    pub settle_ms: u64,
    /// Pause between closing the gate and sampling the chute
    pub drop_wait_ms: u64,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            open_deg: 180.0,
            closed_deg: 0.0,
            settle_ms: 500,
            drop_wait_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Detection {
    pub deviation_threshold_mm: i32,
    pub variation_threshold_mm: i32,
    /// Readings per sampling round
    pub samples: usize,
    pub sample_interval_ms: u64,
    /// Distance substituted for failed reads
    pub fallback_distance_mm: i32,
}

impl Default for Detection {
    fn default() -> Self {
        Self {
            deviation_threshold_mm: 5,
            variation_threshold_mm: 8,
            samples: 10,
            sample_interval_ms: 100,
            fallback_distance_mm: 150,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retry {
    pub max_attempts: u32,
    /// Pause after a confirmed drop before re-measuring the baseline
    pub recalibrate_delay_ms: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            recalibrate_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Acknowledge {
    /// Success screen returns home after this long
    pub success_ms: u64,
    /// Assistance screen returns home after this long
    pub assistance_ms: u64,
}

impl Default for Acknowledge {
    fn default() -> Self {
        Self {
            success_ms: 5_000,
            assistance_ms: 10_000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub instructions: Option<String>,
    pub next_dose: Option<String>,
}

impl Default for Patient {
    fn default() -> Self {
        Self {
            id: "001".to_string(),
            name: "Patient 1".to_string(),
            instructions: None,
            next_dose: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub motion: Motion,
    #[serde(default)]
    pub detection: Detection,
    #[serde(default)]
    pub retry: Retry,
    #[serde(default)]
    pub acknowledge: Acknowledge,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub patient: Patient,
    /// Prescription, in dispensing order
    #[serde(default)]
    pub hoppers: Vec<HopperCfg>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_prescription_csv(path: &std::path::Path) -> eyre::Result<Vec<HopperCfg>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open prescription CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["label", "channel", "required"];
    let actual: Vec<String> = headers.iter().map(ToString::to_string).collect();
    if actual != expected {
        eyre::bail!(
            "prescription CSV must have headers 'label,channel,required', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<HopperCfg>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.is_empty() {
        eyre::bail!("prescription CSV {:?} has no rows", path);
    }
    Ok(rows)
}

/// Channel and label checks shared by TOML and CSV prescriptions.
pub fn validate_hoppers(hoppers: &[HopperCfg]) -> eyre::Result<()> {
    let mut seen = HashSet::new();
    for (i, h) in hoppers.iter().enumerate() {
        if h.label.trim().is_empty() {
            eyre::bail!("hoppers[{i}].label must not be empty");
        }
        if h.channel > MAX_CHANNEL {
            eyre::bail!("hoppers[{i}].channel must be <= {MAX_CHANNEL}");
        }
        if !seen.insert(h.channel) {
            eyre::bail!("hoppers[{i}].channel {} is used twice", h.channel);
        }
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Hardware
        if self.hardware.servo_pwm_hz == 0 {
            eyre::bail!("hardware.servo_pwm_hz must be > 0");
        }
        if self.hardware.servo_min_pulse_us >= self.hardware.servo_max_pulse_us {
            eyre::bail!("hardware.servo_min_pulse_us must be < servo_max_pulse_us");
        }
        if self.hardware.sensor_read_timeout_ms == 0 {
            eyre::bail!("hardware.sensor_read_timeout_ms must be >= 1");
        }

        // Motion
        for (name, deg) in [
            ("open_deg", self.motion.open_deg),
            ("closed_deg", self.motion.closed_deg),
        ] {
            if !(0.0..=180.0).contains(&deg) {
                eyre::bail!("motion.{name} must be in [0, 180]");
            }
        }
        if self.motion.settle_ms > 60_000 {
            eyre::bail!("motion.settle_ms is unreasonably large (>60s)");
        }

        // Detection
        if self.detection.deviation_threshold_mm <= 0 {
            eyre::bail!("detection.deviation_threshold_mm must be > 0");
        }
        if self.detection.variation_threshold_mm <= 0 {
            eyre::bail!("detection.variation_threshold_mm must be > 0");
        }
        if self.detection.samples == 0 {
            eyre::bail!("detection.samples must be >= 1");
        }
        if self.detection.samples > 1000 {
            eyre::bail!("detection.samples is unreasonably large (>1000)");
        }

        // Retry
        if self.retry.max_attempts == 0 {
            eyre::bail!("retry.max_attempts must be >= 1");
        }

        // Acknowledge
        if self.acknowledge.success_ms > 24 * 60 * 60 * 1000
            || self.acknowledge.assistance_ms > 24 * 60 * 60 * 1000
        {
            eyre::bail!("acknowledge timeouts are unreasonably large (>24h)");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        validate_hoppers(&self.hoppers)
    }
}

//! Runtime configuration for the dispense loop.
//!
//! These are the structs the session works with; they are separate from the
//! TOML-deserialized config in `pillwheel_config` (see `conversions`).
//!
//! The threshold and attempt defaults were tuned on the prototype rig and are
//! kept as-is.

use std::time::Duration;

/// Minimum |reading - baseline| (mm) that counts as a pill in the chute.
pub const DEV_THRESHOLD_MM: i32 = 5;
/// Minimum spread within one sampling round (mm) that counts as a pill.
pub const VAR_THRESHOLD_MM: i32 = 8;
/// Failed detections on one hopper before assistance is requested.
pub const MAX_ATTEMPTS: u32 = 5;
/// Reading substituted when the sensor is unavailable.
pub const FALLBACK_DISTANCE_MM: i32 = 150;

/// Drop classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionCfg {
    pub deviation_threshold_mm: i32,
    pub variation_threshold_mm: i32,
}

impl Default for DetectionCfg {
    fn default() -> Self {
        Self {
            deviation_threshold_mm: DEV_THRESHOLD_MM,
            variation_threshold_mm: VAR_THRESHOLD_MM,
        }
    }
}

/// Sensor polling for one sampling round.
#[derive(Debug, Clone)]
pub struct SamplingCfg {
    /// Readings per round.
    pub samples: usize,
    /// Gap between consecutive readings.
    pub interval_ms: u64,
    /// Per-read sensor timeout.
    pub read_timeout_ms: u64,
    pub fallback_mm: i32,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            samples: 10,
            interval_ms: 100,
            read_timeout_ms: 150,
            fallback_mm: FALLBACK_DISTANCE_MM,
        }
    }
}

/// Servo motion for one dispense cycle.
#[derive(Debug, Clone)]
pub struct MotionCfg {
    pub open_deg: f32,
    pub closed_deg: f32,
    /// Pause after each servo move.
    pub settle_ms: u64,
    /// Pause between the end of the cycle and sampling.
    pub drop_wait_ms: u64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            open_deg: 180.0,
            closed_deg: 0.0,
            settle_ms: 500,
            drop_wait_ms: 1000,
        }
    }
}

impl MotionCfg {
    #[inline]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    #[inline]
    pub fn drop_wait(&self) -> Duration {
        Duration::from_millis(self.drop_wait_ms)
    }
}

#[derive(Debug, Clone)]
pub struct RetryCfg {
    pub max_attempts: u32,
    /// Pause after a confirmed drop before re-measuring the baseline.
    pub recalibrate_delay_ms: u64,
}

impl Default for RetryCfg {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            recalibrate_delay_ms: 1000,
        }
    }
}

/// How long terminal screens stay up without an explicit acknowledgement.
#[derive(Debug, Clone)]
pub struct AckCfg {
    pub success_ms: u64,
    pub assistance_ms: u64,
}

impl Default for AckCfg {
    fn default() -> Self {
        Self {
            success_ms: 5_000,
            assistance_ms: 10_000,
        }
    }
}

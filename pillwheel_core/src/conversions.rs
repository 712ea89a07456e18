//! `From` implementations bridging `pillwheel_config` types to `pillwheel_core` types.

use crate::builder::SessionBuilder;
use crate::config::{AckCfg, DetectionCfg, MotionCfg, RetryCfg, SamplingCfg};
use crate::prescription::{HopperSpec, Patient, Prescription};

// ── DetectionCfg ─────────────────────────────────────────────────────────────

impl From<&pillwheel_config::Detection> for DetectionCfg {
    fn from(c: &pillwheel_config::Detection) -> Self {
        Self {
            deviation_threshold_mm: c.deviation_threshold_mm,
            variation_threshold_mm: c.variation_threshold_mm,
        }
    }
}

// ── SamplingCfg ──────────────────────────────────────────────────────────────

/// Sampling spans two config sections: the round shape lives in `[detection]`,
/// the per-read timeout in `[hardware]`.
impl From<&pillwheel_config::Config> for SamplingCfg {
    fn from(c: &pillwheel_config::Config) -> Self {
        Self {
            samples: c.detection.samples,
            interval_ms: c.detection.sample_interval_ms,
            read_timeout_ms: c.hardware.sensor_read_timeout_ms,
            fallback_mm: c.detection.fallback_distance_mm,
        }
    }
}

// ── MotionCfg ────────────────────────────────────────────────────────────────

impl From<&pillwheel_config::Motion> for MotionCfg {
    fn from(c: &pillwheel_config::Motion) -> Self {
        Self {
            open_deg: c.open_deg,
            closed_deg: c.closed_deg,
            settle_ms: c.settle_ms,
            drop_wait_ms: c.drop_wait_ms,
        }
    }
}

// ── RetryCfg / AckCfg ────────────────────────────────────────────────────────

impl From<&pillwheel_config::Retry> for RetryCfg {
    fn from(c: &pillwheel_config::Retry) -> Self {
        Self {
            max_attempts: c.max_attempts,
            recalibrate_delay_ms: c.recalibrate_delay_ms,
        }
    }
}

impl From<&pillwheel_config::Acknowledge> for AckCfg {
    fn from(c: &pillwheel_config::Acknowledge) -> Self {
        Self {
            success_ms: c.success_ms,
            assistance_ms: c.assistance_ms,
        }
    }
}

// ── Prescription ─────────────────────────────────────────────────────────────

impl From<&pillwheel_config::Patient> for Patient {
    fn from(c: &pillwheel_config::Patient) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            instructions: c.instructions.clone(),
            next_dose: c.next_dose.clone(),
        }
    }
}

impl From<&pillwheel_config::HopperCfg> for HopperSpec {
    fn from(c: &pillwheel_config::HopperCfg) -> Self {
        Self {
            label: c.label.clone(),
            channel: c.channel,
            required: c.required,
        }
    }
}

/// The `[patient]` section plus `[[hoppers]]` in declaration order.
impl From<&pillwheel_config::Config> for Prescription {
    fn from(c: &pillwheel_config::Config) -> Self {
        Self {
            patient: Patient::from(&c.patient),
            hoppers: c.hoppers.iter().map(HopperSpec::from).collect(),
        }
    }
}

impl<S, V> SessionBuilder<S, V> {
    /// Apply every tuning section of a loaded config.
    pub fn with_config(self, cfg: &pillwheel_config::Config) -> Self {
        self.with_detection(DetectionCfg::from(&cfg.detection))
            .with_sampling(SamplingCfg::from(cfg))
            .with_motion(MotionCfg::from(&cfg.motion))
            .with_retry(RetryCfg::from(&cfg.retry))
            .with_ack(AckCfg::from(&cfg.acknowledge))
    }
}

//! Drop detection: did a pill pass the sensor during this sampling round?
//!
//! The threshold classifier compares the extremes of a batch against the
//! baseline and against each other. Three conditions are OR-ed, checked in
//! this order (the first hit names the reason):
//!
//! 1. `|min - baseline| >= deviation_threshold_mm`
//! 2. `|max - baseline| >= deviation_threshold_mm`
//! 3. `max - min >= variation_threshold_mm`

use crate::config::DetectionCfg;
use crate::sampler::SensorSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictReason {
    MinDeviation { deviation_mm: i32 },
    MaxDeviation { deviation_mm: i32 },
    Variation { variation_mm: i32 },
    WithinBaseline { deviation_mm: i32, variation_mm: i32 },
    NoSamples,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub detected: bool,
    pub reason: VerdictReason,
}

impl Verdict {
    #[inline]
    fn hit(reason: VerdictReason) -> Self {
        Self {
            detected: true,
            reason,
        }
    }

    #[inline]
    fn miss(reason: VerdictReason) -> Self {
        Self {
            detected: false,
            reason,
        }
    }
}

/// Seam for swapping the classification heuristic.
pub trait DropClassifier {
    fn classify(&self, samples: &[SensorSample], baseline_mm: i32) -> Verdict;
}

/// Fixed-threshold classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropDetector {
    cfg: DetectionCfg,
}

impl DropDetector {
    pub fn new(cfg: DetectionCfg) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &DetectionCfg {
        &self.cfg
    }
}

impl DropClassifier for DropDetector {
    fn classify(&self, samples: &[SensorSample], baseline_mm: i32) -> Verdict {
        classify(samples, baseline_mm, &self.cfg)
    }
}

/// Pure threshold classification of one sampling round.
pub fn classify(samples: &[SensorSample], baseline_mm: i32, cfg: &DetectionCfg) -> Verdict {
    let Some((min_d, max_d)) = extremes(samples) else {
        return Verdict::miss(VerdictReason::NoSamples);
    };
    let min_dev = abs_diff_i32(min_d, baseline_mm);
    let max_dev = abs_diff_i32(max_d, baseline_mm);
    let variation = max_d.saturating_sub(min_d);

    if min_dev >= cfg.deviation_threshold_mm {
        Verdict::hit(VerdictReason::MinDeviation {
            deviation_mm: min_dev,
        })
    } else if max_dev >= cfg.deviation_threshold_mm {
        Verdict::hit(VerdictReason::MaxDeviation {
            deviation_mm: max_dev,
        })
    } else if variation >= cfg.variation_threshold_mm {
        Verdict::hit(VerdictReason::Variation {
            variation_mm: variation,
        })
    } else {
        Verdict::miss(VerdictReason::WithinBaseline {
            deviation_mm: min_dev.max(max_dev),
            variation_mm: variation,
        })
    }
}

/// `(min, max)` distance of a batch, or `None` when it is empty.
pub fn extremes(samples: &[SensorSample]) -> Option<(i32, i32)> {
    let mut it = samples.iter().map(|s| s.distance_mm);
    let first = it.next()?;
    Some(it.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}

/// |a - b| saturating at i32::MAX so extreme readings cannot overflow.
#[inline]
fn abs_diff_i32(a: i32, b: i32) -> i32 {
    i32::try_from(a.abs_diff(b)).unwrap_or(i32::MAX)
}

//! Sensor polling for drop detection.
//!
//! `SensorSampler` owns the distance sensor and takes either a single
//! reference reading (`sample_once`, used for baselines) or a paced batch
//! (`sample_batch`). Sampling never fails: a read error substitutes the
//! configured fallback distance so the session can keep going on a flaky or
//! missing sensor. The first degradation is logged at `warn`, repeats at
//! `debug`.
use crate::config::SamplingCfg;
use crate::hw_error::map_hw_error;
use pillwheel_traits::{Clock, DistanceSensor};
use std::sync::Arc;
use std::time::Duration;

/// One distance reading taken during a sampling round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSample {
    pub distance_mm: i32,
    /// Position in the sampler's lifetime sequence of readings.
    pub seq: usize,
}

pub struct SensorSampler<S: DistanceSensor> {
    sensor: S,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: SamplingCfg,
    seq: usize,
    degraded: bool,
    fallbacks: u64,
}

impl<S: DistanceSensor> core::fmt::Debug for SensorSampler<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SensorSampler")
            .field("cfg", &self.cfg)
            .field("seq", &self.seq)
            .field("degraded", &self.degraded)
            .finish()
    }
}

impl<S: DistanceSensor> SensorSampler<S> {
    pub fn new(sensor: S, clock: Arc<dyn Clock + Send + Sync>, cfg: SamplingCfg) -> Self {
        Self {
            sensor,
            clock,
            cfg,
            seq: 0,
            degraded: false,
            fallbacks: 0,
        }
    }

    pub fn cfg(&self) -> &SamplingCfg {
        &self.cfg
    }

    /// True once any read has fallen back to the substitute distance.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Number of readings replaced by the fallback distance so far.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks
    }

    /// Single reading.
    pub fn sample_once(&mut self) -> SensorSample {
        let distance_mm = self.read_or_fallback();
        let sample = SensorSample {
            distance_mm,
            seq: self.seq,
        };
        self.seq = self.seq.wrapping_add(1);
        sample
    }

    /// Exactly `n` readings, `interval` of clock time apart (no trailing wait).
    pub fn sample_batch(&mut self, n: usize, interval: Duration) -> Vec<SensorSample> {
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            if i > 0 {
                self.clock.sleep(interval);
            }
            out.push(self.sample_once());
        }
        tracing::debug!(
            n,
            min = out.iter().map(|s| s.distance_mm).min(),
            max = out.iter().map(|s| s.distance_mm).max(),
            "sample batch"
        );
        out
    }

    /// Batch sized and paced by the configured `SamplingCfg`.
    pub fn sample_round(&mut self) -> Vec<SensorSample> {
        let n = self.cfg.samples;
        let interval = Duration::from_millis(self.cfg.interval_ms);
        self.sample_batch(n, interval)
    }

    fn read_or_fallback(&mut self) -> i32 {
        let timeout = Duration::from_millis(self.cfg.read_timeout_ms);
        match self.sensor.read_mm(timeout) {
            Ok(mm) => {
                tracing::trace!(mm, "distance");
                mm
            }
            Err(e) => {
                let mapped = map_hw_error(&*e);
                self.fallbacks = self.fallbacks.saturating_add(1);
                if self.degraded {
                    tracing::debug!(error = %mapped, fallback_mm = self.cfg.fallback_mm, "sensor read failed");
                } else {
                    self.degraded = true;
                    tracing::warn!(
                        error = %mapped,
                        fallback_mm = self.cfg.fallback_mm,
                        "sensor unavailable, substituting fallback distance"
                    );
                }
                self.cfg.fallback_mm
            }
        }
    }
}

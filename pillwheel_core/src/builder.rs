//! Type-state builder for `DispenseSession`.
//!
//! The builder enforces at compile time that a sensor and a servo are provided
//! before `build()` is available. `try_build()` is always available for dynamic
//! checks.

use std::marker::PhantomData;
use std::sync::Arc;

use pillwheel_traits::{Clock, DistanceSensor, MonotonicClock, Servo};

use crate::actuator::HopperActuator;
use crate::config::{AckCfg, DetectionCfg, MotionCfg, RetryCfg, SamplingCfg};
use crate::detector::{DropClassifier, DropDetector};
use crate::error::{BuildError, Result};
use crate::events::{EventSink, NullSink};
use crate::retry::RetryPolicy;
use crate::sampler::SensorSampler;
use crate::session::{DispenseSession, DynSensor, DynServo};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `DispenseSession`. All settings are validated on `build()`.
pub struct SessionBuilder<S, V> {
    sensor: Option<DynSensor>,
    servo: Option<DynServo>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    detection: Option<DetectionCfg>,
    sampling: Option<SamplingCfg>,
    motion: Option<MotionCfg>,
    retry: Option<RetryCfg>,
    ack: Option<AckCfg>,
    classifier: Option<Box<dyn DropClassifier + Send>>,
    sink: Option<Box<dyn EventSink + Send>>,
    _s: PhantomData<S>,
    _v: PhantomData<V>,
}

impl Default for SessionBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            sensor: None,
            servo: None,
            clock: None,
            detection: None,
            sampling: None,
            motion: None,
            retry: None,
            ack: None,
            classifier: None,
            sink: None,
            _s: PhantomData,
            _v: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(
    detection: &DetectionCfg,
    sampling: &SamplingCfg,
    motion: &MotionCfg,
    retry: &RetryCfg,
) -> Result<()> {
    if detection.deviation_threshold_mm <= 0 {
        return Err(invalid("deviation_threshold_mm must be > 0"));
    }
    if detection.variation_threshold_mm <= 0 {
        return Err(invalid("variation_threshold_mm must be > 0"));
    }
    if sampling.samples == 0 {
        return Err(invalid("samples must be >= 1"));
    }
    if sampling.read_timeout_ms == 0 {
        return Err(invalid("read_timeout_ms must be >= 1"));
    }
    for deg in [motion.open_deg, motion.closed_deg] {
        if !deg.is_finite() || !(0.0..=180.0).contains(&deg) {
            return Err(invalid("servo angles must be within [0, 180] degrees"));
        }
    }
    if (motion.open_deg - motion.closed_deg).abs() < f32::EPSILON {
        return Err(invalid("open_deg and closed_deg must differ"));
    }
    if retry.max_attempts == 0 {
        return Err(invalid("max_attempts must be >= 1"));
    }
    Ok(())
}

impl<S, V> SessionBuilder<S, V> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<DispenseSession> {
        let sensor = self
            .sensor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensor))?;
        let servo = self
            .servo
            .ok_or_else(|| eyre::Report::new(BuildError::MissingServo))?;

        let detection = self.detection.unwrap_or_default();
        let sampling = self.sampling.unwrap_or_default();
        let motion = self.motion.unwrap_or_default();
        let retry = self.retry.unwrap_or_default();
        validate(&detection, &sampling, &motion, &retry)?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };
        let classifier = self
            .classifier
            .unwrap_or_else(|| Box::new(DropDetector::new(detection)));
        let sink = self.sink.unwrap_or_else(|| Box::new(NullSink));

        Ok(DispenseSession::from_parts(
            SensorSampler::new(sensor, clock.clone(), sampling),
            HopperActuator::new(servo, clock.clone(), motion),
            classifier,
            sink,
            clock,
            RetryPolicy::from(&retry),
            self.ack.unwrap_or_default(),
        ))
    }
}

/// Chainable setters that do not affect type-state.
impl<S, V> SessionBuilder<S, V> {
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    pub fn with_detection(mut self, detection: DetectionCfg) -> Self {
        self.detection = Some(detection);
        self
    }
    pub fn with_sampling(mut self, sampling: SamplingCfg) -> Self {
        self.sampling = Some(sampling);
        self
    }
    pub fn with_motion(mut self, motion: MotionCfg) -> Self {
        self.motion = Some(motion);
        self
    }
    pub fn with_retry(mut self, retry: RetryCfg) -> Self {
        self.retry = Some(retry);
        self
    }
    pub fn with_ack(mut self, ack: AckCfg) -> Self {
        self.ack = Some(ack);
        self
    }
    /// Replace the threshold detector (the `detection` thresholds are then unused).
    pub fn with_classifier(mut self, classifier: impl DropClassifier + Send + 'static) -> Self {
        self.classifier = Some(Box::new(classifier));
        self
    }
    pub fn with_sink(mut self, sink: impl EventSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }
}

// Setters that advance type-state
impl<V> SessionBuilder<Missing, V> {
    pub fn with_sensor(
        self,
        sensor: impl DistanceSensor + Send + 'static,
    ) -> SessionBuilder<Set, V> {
        SessionBuilder {
            sensor: Some(Box::new(sensor)),
            servo: self.servo,
            clock: self.clock,
            detection: self.detection,
            sampling: self.sampling,
            motion: self.motion,
            retry: self.retry,
            ack: self.ack,
            classifier: self.classifier,
            sink: self.sink,
            _s: PhantomData,
            _v: PhantomData,
        }
    }
}

impl<S> SessionBuilder<S, Missing> {
    pub fn with_servo(self, servo: impl Servo + Send + 'static) -> SessionBuilder<S, Set> {
        SessionBuilder {
            sensor: self.sensor,
            servo: Some(Box::new(servo)),
            clock: self.clock,
            detection: self.detection,
            sampling: self.sampling,
            motion: self.motion,
            retry: self.retry,
            ack: self.ack,
            classifier: self.classifier,
            sink: self.sink,
            _s: PhantomData,
            _v: PhantomData,
        }
    }
}

impl SessionBuilder<Set, Set> {
    /// Validate and build the session. Only available when sensor and servo are set.
    pub fn build(self) -> Result<DispenseSession> {
        self.try_build()
    }
}

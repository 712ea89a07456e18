//! Test doubles for sensors, servos, classifiers and event sinks.
//!
//! Recording doubles hand out a shared handle so a test can inspect what
//! happened after the double has been moved into a session.
use crate::detector::{DropClassifier, Verdict, VerdictReason};
use crate::events::{DispenseEvent, EventSink};
use crate::sampler::SensorSample;
use pillwheel_traits::{DistanceSensor, Servo};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Always reads the same distance.
#[derive(Debug, Clone, Copy)]
pub struct FixedSensor(pub i32);

impl DistanceSensor for FixedSensor {
    fn read_mm(&mut self, _timeout: Duration) -> Result<i32, BoxError> {
        Ok(self.0)
    }
}

/// Plays back a script of readings, then repeats the last one.
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    script: VecDeque<i32>,
    last: i32,
}

impl ScriptedSensor {
    pub fn new(readings: impl IntoIterator<Item = i32>) -> Self {
        Self {
            script: readings.into_iter().collect(),
            last: crate::config::FALLBACK_DISTANCE_MM,
        }
    }
}

impl DistanceSensor for ScriptedSensor {
    fn read_mm(&mut self, _timeout: Duration) -> Result<i32, BoxError> {
        if let Some(v) = self.script.pop_front() {
            self.last = v;
        }
        Ok(self.last)
    }
}

/// Every read fails.
#[derive(Debug, Clone, Copy)]
pub struct FailingSensor;

impl DistanceSensor for FailingSensor {
    fn read_mm(&mut self, _timeout: Duration) -> Result<i32, BoxError> {
        Err(Box::new(std::io::Error::other("sensor offline")))
    }
}

/// Records every `(channel, degrees)` command.
#[derive(Debug, Clone, Default)]
pub struct RecordingServo {
    moves: Arc<Mutex<Vec<(u8, f32)>>>,
}

impl RecordingServo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Arc<Mutex<Vec<(u8, f32)>>> {
        self.moves.clone()
    }
}

impl Servo for RecordingServo {
    fn set_angle(&mut self, channel: u8, degrees: f32) -> Result<(), BoxError> {
        if let Ok(mut m) = self.moves.lock() {
            m.push((channel, degrees));
        }
        Ok(())
    }
}

/// Every move fails.
#[derive(Debug, Clone, Copy)]
pub struct FailingServo;

impl Servo for FailingServo {
    fn set_angle(&mut self, _channel: u8, _degrees: f32) -> Result<(), BoxError> {
        Err(Box::new(std::io::Error::other("servo driver not found")))
    }
}

/// Number of full open moves in a servo log (one per dispense cycle).
pub fn count_cycles(moves: &[(u8, f32)], open_deg: f32) -> usize {
    moves
        .iter()
        .filter(|(_, d)| (*d - open_deg).abs() < f32::EPSILON)
        .count()
}

/// Collects events into a shared vector.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<DispenseEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Arc<Mutex<Vec<DispenseEvent>>> {
        self.events.clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: DispenseEvent) {
        if let Ok(mut e) = self.events.lock() {
            e.push(event);
        }
    }
}

/// Classifier that always reports a drop.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysDetect;

impl DropClassifier for AlwaysDetect {
    fn classify(&self, _samples: &[SensorSample], _baseline_mm: i32) -> Verdict {
        Verdict {
            detected: true,
            reason: VerdictReason::Variation { variation_mm: 0 },
        }
    }
}

/// Classifier that never reports a drop.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverDetect;

impl DropClassifier for NeverDetect {
    fn classify(&self, _samples: &[SensorSample], _baseline_mm: i32) -> Verdict {
        Verdict {
            detected: false,
            reason: VerdictReason::WithinBaseline {
                deviation_mm: 0,
                variation_mm: 0,
            },
        }
    }
}

/// Plays back a script of verdicts, then keeps returning `fallback`.
#[derive(Debug)]
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
}

impl ScriptedClassifier {
    pub fn new(script: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
        }
    }
}

impl DropClassifier for ScriptedClassifier {
    fn classify(&self, _samples: &[SensorSample], _baseline_mm: i32) -> Verdict {
        let detected = self
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or(self.fallback);
        if detected {
            AlwaysDetect.classify(&[], 0)
        } else {
            NeverDetect.classify(&[], 0)
        }
    }
}

//! The dispense-verification state machine (`DispenseSession`).
//!
//! A session owns the sensor, the servo bank, the classifier and the event
//! sink. Hosts drive it one transition at a time through `step()`:
//!
//! ```text
//! start → [ready_for_collection] → confirm_prescription
//!   MeasuringBaseline → Actuating → Sampling → Evaluating ─┬→ Actuating (retry / next hopper)
//!                                                         ├→ Success
//!                                                         └→ Escalated
//!   Success | Escalated → Idle   (acknowledge, or after the ack window)
//! ```
//!
//! Every transition emits exactly one `DispenseEvent`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pillwheel_traits::{Clock, DistanceSensor, Servo};

use crate::actuator::HopperActuator;
use crate::config::AckCfg;
use crate::detector::{DropClassifier, extremes};
use crate::error::{DispenseError, EscalationReason};
use crate::events::{DispenseEvent, EventSink};
use crate::prescription::{Hopper, HopperId, HopperSummary, Patient, Prescription};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::sampler::{SensorSample, SensorSampler};
use crate::sequencer::{all_satisfied, next_target};
use crate::status::SessionState;

pub(crate) type DynSensor = Box<dyn DistanceSensor + Send>;
pub(crate) type DynServo = Box<dyn Servo + Send>;

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { per_hopper_counts: Vec<HopperSummary> },
    Escalated(EscalationReason),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// `Ok(counts)` on success, `DispenseError::Escalated` otherwise.
    pub fn into_result(self) -> Result<Vec<HopperSummary>, DispenseError> {
        match self {
            Outcome::Success { per_hopper_counts } => Ok(per_hopper_counts),
            Outcome::Escalated(reason) => Err(DispenseError::Escalated(reason)),
        }
    }
}

/// Prescription loaded but not yet confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    CallingPatient,
    Verifying,
}

pub struct DispenseSession {
    sampler: SensorSampler<DynSensor>,
    actuator: HopperActuator<DynServo>,
    classifier: Box<dyn DropClassifier + Send>,
    sink: Box<dyn EventSink + Send>,
    clock: Arc<dyn Clock + Send + Sync>,
    retry: RetryPolicy,
    ack: AckCfg,

    state: SessionState,
    pending: Option<Pending>,
    patient: Option<Patient>,
    hoppers: Vec<Hopper>,
    active: Option<HopperId>,
    attempt_count: u32,
    baseline_mm: Option<i32>,
    batch: Vec<SensorSample>,
    ack_deadline: Option<Instant>,
    outcome: Option<Outcome>,
}

impl core::fmt::Debug for DispenseSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DispenseSession")
            .field("state", &self.state)
            .field("active", &self.active)
            .field("attempt_count", &self.attempt_count)
            .field("baseline_mm", &self.baseline_mm)
            .field("hoppers", &self.hoppers)
            .finish()
    }
}

impl DispenseSession {
    pub fn builder() -> crate::builder::SessionBuilder<crate::builder::Missing, crate::builder::Missing>
    {
        crate::builder::SessionBuilder::default()
    }

    pub(crate) fn from_parts(
        sampler: SensorSampler<DynSensor>,
        actuator: HopperActuator<DynServo>,
        classifier: Box<dyn DropClassifier + Send>,
        sink: Box<dyn EventSink + Send>,
        clock: Arc<dyn Clock + Send + Sync>,
        retry: RetryPolicy,
        ack: AckCfg,
    ) -> Self {
        Self {
            sampler,
            actuator,
            classifier,
            sink,
            clock,
            retry,
            ack,
            state: SessionState::Idle,
            pending: None,
            patient: None,
            hoppers: Vec::new(),
            active: None,
            attempt_count: 0,
            baseline_mm: None,
            batch: Vec::new(),
            ack_deadline: None,
            outcome: None,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn hoppers(&self) -> &[Hopper] {
        &self.hoppers
    }

    pub fn hopper_summaries(&self) -> Vec<HopperSummary> {
        self.hoppers.iter().map(Hopper::summary).collect()
    }

    /// The hopper being dispensed from, if any.
    pub fn active_hopper(&self) -> Option<&Hopper> {
        self.active.and_then(|id| self.hoppers.get(id.index()))
    }

    /// Consecutive misses on the active hopper.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts()
    }

    pub fn baseline_mm(&self) -> Option<i32> {
        self.baseline_mm
    }

    pub fn patient(&self) -> Option<&Patient> {
        self.patient.as_ref()
    }

    /// Result of the most recent session to reach a terminal state.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// A prescription is loaded and the session has not returned to `Idle`.
    pub fn is_in_progress(&self) -> bool {
        self.state != SessionState::Idle || self.pending.is_some()
    }

    /// Waiting for the patient to confirm or reject.
    pub fn awaiting_confirmation(&self) -> bool {
        self.pending.is_some()
    }

    /// Time left before a terminal state clears itself.
    pub fn ack_remaining(&self) -> Option<Duration> {
        self.ack_deadline
            .map(|d| d.saturating_duration_since(self.clock.now()))
    }

    pub fn clock(&self) -> Arc<dyn Clock + Send + Sync> {
        self.clock.clone()
    }

    /// Sensor reads replaced by the fallback distance so far.
    pub fn sensor_fallbacks(&self) -> u64 {
        self.sampler.fallback_count()
    }

    // ── Host inputs ──────────────────────────────────────────────────────────

    /// Load a prescription and call the patient.
    pub fn start(&mut self, prescription: Prescription) -> Result<(), DispenseError> {
        if self.is_in_progress() {
            return Err(DispenseError::State(format!(
                "a dispense session is already in progress ({})",
                self.state
            )));
        }
        prescription.validate()?;

        let Prescription { patient, hoppers } = prescription;
        self.hoppers = hoppers
            .iter()
            .enumerate()
            .map(|(i, spec)| Hopper::from_spec(HopperId(i), spec))
            .collect();
        self.active = None;
        self.attempt_count = 0;
        self.baseline_mm = None;
        self.batch.clear();
        self.ack_deadline = None;
        self.outcome = None;
        self.pending = Some(Pending::CallingPatient);

        tracing::info!(
            patient = %patient.id,
            hoppers = self.hoppers.len(),
            "prescription loaded"
        );
        self.sink.emit(DispenseEvent::CallingPatient {
            patient_id: patient.id.clone(),
            patient_name: patient.name.clone(),
        });
        self.patient = Some(patient);
        Ok(())
    }

    /// The patient is at the machine: show the prescription for verification.
    pub fn ready_for_collection(&mut self) -> Result<(), DispenseError> {
        if self.pending != Some(Pending::CallingPatient) {
            return Err(DispenseError::State(
                "no patient is being called".to_string(),
            ));
        }
        self.pending = Some(Pending::Verifying);
        tracing::info!("awaiting verification");
        self.sink.emit(DispenseEvent::AwaitingVerification {
            hopper_summaries: self.hopper_summaries(),
        });
        Ok(())
    }

    /// Patient accepted the prescription; dispensing begins on the next `step()`.
    pub fn confirm_prescription(&mut self) -> Result<SessionState, DispenseError> {
        if self.pending.take().is_none() {
            return Err(DispenseError::State(
                "no prescription awaiting confirmation".to_string(),
            ));
        }
        self.state = SessionState::MeasuringBaseline;
        tracing::info!("prescription confirmed");
        self.sink.emit(DispenseEvent::PrescriptionConfirmed);
        Ok(self.state)
    }

    /// Patient rejected the prescription: escalate before anything moves.
    pub fn reject_prescription(&mut self) -> Result<SessionState, DispenseError> {
        if self.pending.is_none() {
            return Err(DispenseError::State(
                "no prescription awaiting confirmation".to_string(),
            ));
        }
        self.escalate(EscalationReason::Rejected);
        Ok(self.state)
    }

    /// Collapse a terminal state back to `Idle` without waiting.
    pub fn acknowledge(&mut self) -> Result<SessionState, DispenseError> {
        if !self.state.is_terminal() {
            return Err(DispenseError::State(format!(
                "nothing to acknowledge in state {}",
                self.state
            )));
        }
        self.return_to_idle();
        Ok(self.state)
    }

    /// Force escalation from any non-terminal state with a prescription loaded.
    /// No-op when terminal or when nothing is loaded.
    pub fn abort(&mut self) -> SessionState {
        if self.state.is_terminal() || !self.is_in_progress() {
            return self.state;
        }
        self.escalate(EscalationReason::Aborted);
        self.state
    }

    /// Close every hopper and stop driving the servos.
    pub fn park(&mut self) {
        let channels: Vec<u8> = self.hoppers.iter().map(|h| h.channel).collect();
        self.actuator.park(&channels);
    }

    // ── State machine ────────────────────────────────────────────────────────

    /// Advance exactly one transition and return the new state.
    pub fn step(&mut self) -> SessionState {
        match self.state {
            SessionState::Idle => {}
            SessionState::MeasuringBaseline => {
                self.measure_baseline();
                self.begin_next_target();
            }
            SessionState::Actuating => self.actuate(),
            SessionState::Sampling => self.sample(),
            SessionState::Evaluating => self.evaluate(),
            SessionState::Success | SessionState::Escalated => {
                if self
                    .ack_deadline
                    .is_none_or(|deadline| self.clock.now() >= deadline)
                {
                    self.return_to_idle();
                }
            }
        }
        self.state
    }

    fn measure_baseline(&mut self) {
        let s = self.sampler.sample_once();
        self.baseline_mm = Some(s.distance_mm);
        tracing::debug!(baseline_mm = s.distance_mm, "baseline measured");
    }

    /// Pick the first unsatisfied hopper and get ready to cycle it.
    fn begin_next_target(&mut self) {
        let Some(id) = next_target(&self.hoppers) else {
            self.finish_success();
            return;
        };
        if self.active != Some(id) {
            self.attempt_count = 0;
        }
        self.active = Some(id);
        self.state = SessionState::Actuating;
        self.emit_dispensing(id);
    }

    fn actuate(&mut self) {
        let Some(hopper) = self.active_hopper() else {
            self.begin_next_target();
            return;
        };
        let (id, channel) = (hopper.id, hopper.channel);
        self.actuator.cycle(channel);
        self.clock.sleep(self.actuator.motion().drop_wait());
        self.state = SessionState::Sampling;
        self.sink.emit(DispenseEvent::Actuated { hopper: id });
    }

    fn sample(&mut self) {
        let Some(id) = self.active else {
            self.begin_next_target();
            return;
        };
        self.batch = self.sampler.sample_round();
        let baseline = self.baseline_mm.unwrap_or(self.sampler.cfg().fallback_mm);
        let (min_mm, max_mm) = extremes(&self.batch).unwrap_or((baseline, baseline));
        self.state = SessionState::Evaluating;
        self.sink.emit(DispenseEvent::Sampled {
            hopper: id,
            min_mm,
            max_mm,
        });
    }

    fn evaluate(&mut self) {
        let Some(id) = self.active else {
            self.begin_next_target();
            return;
        };
        let baseline = self.baseline_mm.unwrap_or(self.sampler.cfg().fallback_mm);
        let verdict = self.classifier.classify(&self.batch, baseline);
        tracing::info!(
            hopper = %id,
            detected = verdict.detected,
            reason = ?verdict.reason,
            baseline_mm = baseline,
            "drop evaluated"
        );

        if verdict.detected {
            if let Some(h) = self.hoppers.get_mut(id.index()) {
                h.record_drop();
            }
            self.attempt_count = 0;
            // Re-baseline after every confirmed drop, the last one included.
            self.clock.sleep(self.retry.recalibrate_delay());
            self.measure_baseline();
            if all_satisfied(&self.hoppers) {
                self.finish_success();
            } else {
                self.begin_next_target();
            }
            return;
        }

        self.attempt_count += 1;
        match self.retry.after_miss(self.attempt_count) {
            RetryDecision::Retry { attempt, remaining } => {
                tracing::info!(hopper = %id, attempt, remaining, "no drop detected, retrying");
                self.state = SessionState::Actuating;
                self.emit_dispensing(id);
            }
            RetryDecision::Escalate { attempts } => {
                let hopper = self
                    .hoppers
                    .get(id.index())
                    .map(|h| h.label.clone())
                    .unwrap_or_default();
                self.escalate(EscalationReason::MaxAttempts { hopper, attempts });
            }
        }
    }

    fn emit_dispensing(&mut self, id: HopperId) {
        let Some(active_hopper) = self.hoppers.get(id.index()).map(Hopper::summary) else {
            return;
        };
        let attempt = self.attempt_count + 1;
        let of_max = self.retry.max_attempts();
        tracing::info!(hopper = %active_hopper.label, attempt, of_max, "dispensing");
        self.sink.emit(DispenseEvent::Dispensing {
            active_hopper,
            attempt,
            of_max,
        });
    }

    fn finish_success(&mut self) {
        self.active = None;
        self.state = SessionState::Success;
        self.ack_deadline = Some(self.clock.now() + Duration::from_millis(self.ack.success_ms));
        let per_hopper_counts = self.hopper_summaries();
        tracing::info!("dispense complete");
        self.outcome = Some(Outcome::Success {
            per_hopper_counts: per_hopper_counts.clone(),
        });
        self.sink
            .emit(DispenseEvent::DispenseSucceeded { per_hopper_counts });
    }

    fn escalate(&mut self, reason: EscalationReason) {
        self.pending = None;
        self.active = None;
        self.state = SessionState::Escalated;
        self.ack_deadline =
            Some(self.clock.now() + Duration::from_millis(self.ack.assistance_ms));
        tracing::warn!(reason = %reason, "assistance requested");
        self.outcome = Some(Outcome::Escalated(reason.clone()));
        self.sink.emit(DispenseEvent::AssistanceRequested { reason });
    }

    fn return_to_idle(&mut self) {
        self.state = SessionState::Idle;
        self.active = None;
        self.ack_deadline = None;
        tracing::info!("returned to idle");
        self.sink.emit(DispenseEvent::ReturnedToIdle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{AlwaysDetect, FixedSensor, NeverDetect, RecordingServo, RecordingSink};
    use crate::prescription::HopperSpec;
    use pillwheel_traits::ManualClock;

    fn rx(hoppers: &[(&str, u32)]) -> Prescription {
        Prescription::new(
            Patient::new("001", "Patient 1"),
            hoppers
                .iter()
                .enumerate()
                .map(|(i, (l, n))| HopperSpec::new(*l, i as u8, *n))
                .collect(),
        )
    }

    fn session(classifier: impl DropClassifier + Send + 'static) -> (DispenseSession, RecordingSink) {
        let sink = RecordingSink::new();
        let s = DispenseSession::builder()
            .with_sensor(FixedSensor(150))
            .with_servo(RecordingServo::new())
            .with_clock(Box::new(ManualClock::new()))
            .with_classifier(classifier)
            .with_sink(sink.clone())
            .build()
            .unwrap();
        (s, sink)
    }

    #[test]
    fn active_hopper_only_in_dispensing_states() {
        let (mut s, _) = session(AlwaysDetect);
        s.start(rx(&[("D", 1)])).unwrap();
        s.confirm_prescription().unwrap();
        assert!(s.active_hopper().is_none());
        while !s.state().is_terminal() {
            let st = s.step();
            assert_eq!(st.has_active_hopper(), s.active_hopper().is_some(), "{st}");
        }
    }

    #[test]
    fn start_while_running_is_rejected() {
        let (mut s, _) = session(NeverDetect);
        s.start(rx(&[("D", 1)])).unwrap();
        assert!(matches!(
            s.start(rx(&[("C", 1)])),
            Err(DispenseError::State(_))
        ));
    }

    #[test]
    fn invalid_prescription_leaves_no_state() {
        let (mut s, sink) = session(NeverDetect);
        assert!(s.start(rx(&[("D", 0)])).is_err());
        assert!(!s.is_in_progress());
        assert!(s.hoppers().is_empty());
        assert!(sink.handle().lock().unwrap().is_empty());
    }

    #[test]
    fn ack_window_expires_on_clock() {
        let (mut s, _) = session(NeverDetect);
        s.start(rx(&[("D", 1)])).unwrap();
        s.reject_prescription().unwrap();
        assert_eq!(s.step(), SessionState::Escalated);
        assert_eq!(s.ack_remaining(), Some(Duration::from_secs(10)));
        s.clock().sleep(Duration::from_secs(10));
        assert_eq!(s.step(), SessionState::Idle);
    }
}

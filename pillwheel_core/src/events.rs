//! Events emitted to the presentation layer, one per session transition.

use crate::error::EscalationReason;
use crate::prescription::{HopperId, HopperSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispenseEvent {
    /// A prescription was loaded; ask the patient to come over.
    CallingPatient {
        patient_id: String,
        patient_name: String,
    },
    /// Show the prescription for the patient to confirm.
    AwaitingVerification { hopper_summaries: Vec<HopperSummary> },
    /// The patient confirmed; the baseline is measured next.
    PrescriptionConfirmed,
    /// About to cycle `active_hopper` for the `attempt`-th time (1-based).
    Dispensing {
        active_hopper: HopperSummary,
        attempt: u32,
        of_max: u32,
    },
    Actuated { hopper: HopperId },
    Sampled {
        hopper: HopperId,
        min_mm: i32,
        max_mm: i32,
    },
    DispenseSucceeded {
        per_hopper_counts: Vec<HopperSummary>,
    },
    AssistanceRequested { reason: EscalationReason },
    ReturnedToIdle,
}

impl DispenseEvent {
    /// Stable snake_case name, used in logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            DispenseEvent::CallingPatient { .. } => "calling_patient",
            DispenseEvent::AwaitingVerification { .. } => "awaiting_verification",
            DispenseEvent::PrescriptionConfirmed => "prescription_confirmed",
            DispenseEvent::Dispensing { .. } => "dispensing",
            DispenseEvent::Actuated { .. } => "actuated",
            DispenseEvent::Sampled { .. } => "sampled",
            DispenseEvent::DispenseSucceeded { .. } => "dispense_succeeded",
            DispenseEvent::AssistanceRequested { .. } => "assistance_requested",
            DispenseEvent::ReturnedToIdle => "returned_to_idle",
        }
    }
}

/// Receiver of session events.
pub trait EventSink {
    fn emit(&mut self, event: DispenseEvent);
}

impl EventSink for crossbeam_channel::Sender<DispenseEvent> {
    fn emit(&mut self, event: DispenseEvent) {
        // A dropped receiver only means nobody is watching.
        if self.send(event).is_err() {
            tracing::trace!("event receiver disconnected");
        }
    }
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn emit(&mut self, event: DispenseEvent) {
        (**self).emit(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: DispenseEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_forwards_and_tolerates_disconnect() {
        let (mut tx, rx) = crossbeam_channel::unbounded();
        tx.emit(DispenseEvent::ReturnedToIdle);
        assert_eq!(rx.try_recv().unwrap(), DispenseEvent::ReturnedToIdle);
        drop(rx);
        tx.emit(DispenseEvent::PrescriptionConfirmed);
    }
}

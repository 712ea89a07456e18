#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Text screens for the dispenser.
//!
//! The presenter is a passive observer: it turns `DispenseEvent`s into
//! `Screen`s and never calls back into the session.
use pillwheel_core::{DispenseEvent, EscalationReason, HopperSummary, Patient};
use std::fmt;

/// One rendered screen: a title and body lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub title: String,
    pub lines: Vec<String>,
}

impl Screen {
    fn new(title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            title: title.into(),
            lines,
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .lines
            .iter()
            .map(|l| l.chars().count())
            .chain(std::iter::once(self.title.chars().count()))
            .max()
            .unwrap_or(0);
        let rule = "=".repeat(width + 4);
        writeln!(f, "{rule}")?;
        writeln!(f, "  {}", self.title)?;
        writeln!(f, "{}", "-".repeat(width + 4))?;
        for l in &self.lines {
            writeln!(f, "  {l}")?;
        }
        write!(f, "{rule}")
    }
}

/// Hardware status line for the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareStatus {
    pub servos_ok: bool,
    pub sensor_ok: bool,
}

impl fmt::Display for HardwareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = |ok: bool| if ok { "OK" } else { "Simulation" };
        write!(
            f,
            "Servos: {} | Sensor: {}",
            word(self.servos_ok),
            word(self.sensor_ok)
        )
    }
}

/// "2 pills" / "1 pill".
pub fn pills(n: u32) -> String {
    if n == 1 {
        "1 pill".to_string()
    } else {
        format!("{n} pills")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Presenter {
    patient: Option<Patient>,
    hardware: HardwareStatus,
}

impl Presenter {
    pub fn new(hardware: HardwareStatus) -> Self {
        Self {
            patient: None,
            hardware,
        }
    }

    /// Patient details shown on the success screen.
    pub fn with_patient(mut self, patient: Patient) -> Self {
        self.patient = Some(patient);
        self
    }

    pub fn home(&self) -> Screen {
        Screen::new(
            "PillWheel",
            vec![
                "Automated Medical Dispenser".to_string(),
                self.hardware.to_string(),
            ],
        )
    }

    /// Screen for `event`, or `None` when the event does not change what is shown.
    pub fn render(&mut self, event: &DispenseEvent) -> Option<Screen> {
        match event {
            DispenseEvent::CallingPatient {
                patient_id,
                patient_name,
            } => {
                if self.patient.as_ref().is_none_or(|p| &p.id != patient_id) {
                    self.patient = Some(Patient::new(patient_id.clone(), patient_name.clone()));
                }
                Some(Screen::new(
                    format!("Calling for {patient_name}"),
                    vec![
                        "Please approach the dispenser".to_string(),
                        "[Ready for Collection]".to_string(),
                    ],
                ))
            }
            DispenseEvent::AwaitingVerification { hopper_summaries } => {
                let mut lines = vec!["Today's prescription:".to_string()];
                lines.extend(
                    hopper_summaries
                        .iter()
                        .map(|h| format!("  {} - {}", h.label, pills(h.required))),
                );
                lines.push(String::new());
                lines.push("Is this the correct prescription and dose?".to_string());
                lines.push("[YES] [NO]".to_string());
                Some(Screen::new("Please Verify Your Prescription", lines))
            }
            DispenseEvent::PrescriptionConfirmed => Some(Screen::new(
                "Dispensing...",
                vec!["Measuring the chute".to_string()],
            )),
            DispenseEvent::Dispensing {
                active_hopper,
                attempt,
                of_max,
            } => Some(Screen::new(
                "Dispensing...",
                vec![
                    format!("Dispensing: {}", active_hopper.label),
                    format!(
                        "Attempt {attempt}/{of_max} ({}/{})",
                        active_hopper.dispensed + 1,
                        active_hopper.required
                    ),
                ],
            )),
            DispenseEvent::Actuated { .. } | DispenseEvent::Sampled { .. } => None,
            DispenseEvent::DispenseSucceeded { per_hopper_counts } => {
                Some(self.success(per_hopper_counts))
            }
            DispenseEvent::AssistanceRequested { reason } => Some(Self::assistance(reason)),
            DispenseEvent::ReturnedToIdle => Some(self.home()),
        }
    }

    fn success(&self, counts: &[HopperSummary]) -> Screen {
        let mut lines = vec!["Dispensed:".to_string()];
        lines.extend(
            counts
                .iter()
                .map(|h| format!("  {}: {}", h.label, pills(h.dispensed))),
        );
        if let Some(p) = &self.patient {
            if let Some(instr) = &p.instructions {
                lines.push(format!("Instructions: {instr}"));
            }
            if let Some(next) = &p.next_dose {
                lines.push(format!("Your next dose is scheduled for {next}"));
            }
        }
        lines.push("[Complete]".to_string());
        Screen::new("Pill Has Been Dispensed", lines)
    }

    fn assistance(reason: &EscalationReason) -> Screen {
        let detail = match reason {
            EscalationReason::Rejected => "Prescription was not confirmed".to_string(),
            EscalationReason::MaxAttempts { hopper, attempts } => {
                format!("{hopper} did not dispense after {attempts} attempts")
            }
            EscalationReason::Aborted => "Dispensing was stopped".to_string(),
        };
        Screen::new(
            "Calling for Assistance",
            vec![
                "A care worker will be with you shortly".to_string(),
                detail,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pillwheel_core::HopperId;

    fn summary(label: &str, required: u32, dispensed: u32) -> HopperSummary {
        HopperSummary {
            id: HopperId(0),
            label: label.to_string(),
            required,
            dispensed,
        }
    }

    #[test]
    fn dispensing_shows_attempt_and_progress() {
        let mut p = Presenter::default();
        let s = p
            .render(&DispenseEvent::Dispensing {
                active_hopper: summary("Vitamin D", 2, 1),
                attempt: 3,
                of_max: 5,
            })
            .unwrap();
        assert_eq!(s.lines, vec!["Dispensing: Vitamin D", "Attempt 3/5 (2/2)"]);
    }

    #[test]
    fn success_includes_patient_instructions() {
        let mut patient = Patient::new("001", "Ada");
        patient.instructions = Some("Take with food".into());
        patient.next_dose = Some("08:00".into());
        let mut p = Presenter::default().with_patient(patient);
        let s = p
            .render(&DispenseEvent::DispenseSucceeded {
                per_hopper_counts: vec![summary("Vitamin D", 2, 2), summary("Vitamin C", 1, 1)],
            })
            .unwrap();
        let text = s.to_string();
        assert!(text.contains("Vitamin D: 2 pills"));
        assert!(text.contains("Vitamin C: 1 pill"));
        assert!(text.contains("Instructions: Take with food"));
        assert!(text.contains("Your next dose is scheduled for 08:00"));
    }

    #[test]
    fn intermediate_events_do_not_redraw() {
        let mut p = Presenter::default();
        assert!(p.render(&DispenseEvent::Actuated { hopper: HopperId(0) }).is_none());
    }
}

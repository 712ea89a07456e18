use pillwheel_core::{DispenseEvent, EscalationReason, HopperId, HopperSummary};
use pillwheel_ui::{HardwareStatus, Presenter};
use rstest::rstest;

#[rstest]
fn verification_lists_each_hopper() {
    let mut p = Presenter::default();
    let s = p
        .render(&DispenseEvent::AwaitingVerification {
            hopper_summaries: vec![
                HopperSummary {
                    id: HopperId(0),
                    label: "Vitamin D".into(),
                    required: 2,
                    dispensed: 0,
                },
                HopperSummary {
                    id: HopperId(1),
                    label: "Vitamin C".into(),
                    required: 1,
                    dispensed: 0,
                },
            ],
        })
        .unwrap();
    let text = s.to_string();
    assert!(text.contains("Vitamin D - 2 pills"));
    assert!(text.contains("Vitamin C - 1 pill"));
    assert!(text.contains("Is this the correct prescription and dose?"));
}

#[rstest]
#[case::rejected(EscalationReason::Rejected, "not confirmed")]
#[case::max_attempts(EscalationReason::MaxAttempts { hopper: "Vitamin D".into(), attempts: 5 }, "after 5 attempts")]
#[case::aborted(EscalationReason::Aborted, "stopped")]
fn assistance_screen_names_reason(#[case] reason: EscalationReason, #[case] needle: &str) {
    let mut p = Presenter::default();
    let s = p
        .render(&DispenseEvent::AssistanceRequested { reason })
        .unwrap();
    assert_eq!(s.title, "Calling for Assistance");
    assert!(s.to_string().contains(needle));
}

#[rstest]
fn calling_then_home() {
    let mut p = Presenter::new(HardwareStatus {
        servos_ok: true,
        sensor_ok: false,
    });
    let s = p
        .render(&DispenseEvent::CallingPatient {
            patient_id: "001".into(),
            patient_name: "Patient 1".into(),
        })
        .unwrap();
    assert_eq!(s.title, "Calling for Patient 1");
    let home = p.render(&DispenseEvent::ReturnedToIdle).unwrap();
    assert!(home.to_string().contains("Servos: OK | Sensor: Simulation"));
}

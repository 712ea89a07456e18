use pillwheel_core::mocks::{FixedSensor, RecordingServo, ScriptedClassifier, count_cycles};
use pillwheel_core::{
    DispenseSession, EscalationReason, HopperSpec, Outcome, Patient, Prescription, SessionState,
};
use pillwheel_traits::ManualClock;
use proptest::prelude::*;
use std::time::Duration;

prop_compose! {
    fn prescription_strategy()(
        counts in prop::collection::vec(1u32..4, 1..4),
    ) -> Prescription {
        let hoppers = counts
            .iter()
            .enumerate()
            .map(|(i, &n)| HopperSpec::new(format!("H{i}"), i as u8, n))
            .collect();
        Prescription::new(Patient::new("001", "Patient 1"), hoppers)
    }
}

proptest! {
    #[test]
    fn exactly_one_terminal_and_monotone_counts(
        rx in prescription_strategy(),
        script in prop::collection::vec(any::<bool>(), 0..40),
        tail in any::<bool>(),
    ) {
        let servo = RecordingServo::new();
        let moves = servo.handle();
        let clock = ManualClock::new();
        let mut session = DispenseSession::builder()
            .with_sensor(FixedSensor(150))
            .with_servo(servo)
            .with_clock(Box::new(clock.clone()))
            .with_classifier(ScriptedClassifier::new(script.clone(), tail))
            .build()
            .unwrap();
        let required: Vec<u32> = rx.hoppers.iter().map(|h| h.required).collect();
        session.start(rx).unwrap();
        session.confirm_prescription().unwrap();

        let mut prev = vec![0u32; required.len()];
        let mut reached_terminal = false;
        for _ in 0..10_000 { // bounded steps
            let state = session.step();
            let now: Vec<u32> = session.hoppers().iter().map(|h| h.dispensed()).collect();
            for i in 0..now.len() {
                prop_assert!(now[i] >= prev[i], "count went down");
                prop_assert!(now[i] <= required[i], "count above required");
            }
            prev = now;
            prop_assert_eq!(state.has_active_hopper(), session.active_hopper().is_some());
            if state.is_terminal() {
                reached_terminal = true;
                break;
            }
        }
        prop_assert!(reached_terminal);

        let max_attempts = session.max_attempts();
        let outcome = session.outcome().cloned();
        match &outcome {
            Some(Outcome::Success { per_hopper_counts }) => {
                prop_assert_eq!(session.state(), SessionState::Success);
                for h in per_hopper_counts {
                    prop_assert_eq!(h.dispensed, h.required);
                }
            }
            Some(Outcome::Escalated(EscalationReason::MaxAttempts { attempts, .. })) => {
                prop_assert_eq!(session.state(), SessionState::Escalated);
                prop_assert_eq!(*attempts, max_attempts);
                prop_assert!(session.hoppers().iter().any(|h| h.dispensed() < h.required()));
            }
            other => {
                prop_assert!(false, "unexpected outcome {:?}", other);
            }
        }

        // One actuation per verdict: every hit is a recorded drop, every
        // other verdict a miss.
        let dispensed: u32 = prev.iter().sum();
        let cycles = count_cycles(&moves.lock().unwrap(), 180.0);
        let misses = script
            .iter()
            .copied()
            .chain(std::iter::repeat(tail))
            .take(cycles)
            .filter(|hit| !hit)
            .count() as u32;
        prop_assert_eq!(cycles as u32, dispensed + misses);

        // Once terminal, the outcome sticks: no more actuation, only the
        // ack window running out.
        let terminal = session.state();
        for _ in 0..20 {
            clock.advance(Duration::from_secs(1));
            let state = session.step();
            prop_assert!(state == terminal || state == SessionState::Idle, "left terminal for {state}");
            prop_assert_eq!(session.outcome().cloned(), outcome.clone());
        }
        prop_assert_eq!(session.state(), SessionState::Idle);
        prop_assert_eq!(count_cycles(&moves.lock().unwrap(), 180.0), cycles);
        let after: Vec<u32> = session.hoppers().iter().map(|h| h.dispensed()).collect();
        prop_assert_eq!(after, prev);
    }
}

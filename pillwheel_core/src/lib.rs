#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Dispense-verification control loop (hardware-agnostic).
//!
//! All hardware goes through `pillwheel_traits::DistanceSensor`,
//! `pillwheel_traits::Servo` and `pillwheel_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Sampling**: paced distance batches with fallback on read errors (`sampler`)
//! - **Detection**: fixed-threshold drop classifier (`detector`)
//! - **Actuation**: closed/open/closed servo cycles (`actuator`)
//! - **Sequencing**: first unsatisfied hopper in declaration order (`sequencer`)
//! - **Retry**: bounded attempts per hopper, then escalation (`retry`)
//! - **Session**: the state machine tying these together (`session`), built
//!   with `SessionBuilder` and driven by `step()` or a `runner`
//!
//! The presentation layer only sees `DispenseEvent`s delivered to an
//! `EventSink`.

pub mod actuator;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod detector;
pub mod error;
pub mod events;
pub mod hw_error;
pub mod mocks;
pub mod prescription;
pub mod retry;
pub mod runner;
pub mod sampler;
pub mod sequencer;
pub mod session;
pub mod status;

pub use actuator::HopperActuator;
pub use builder::{Missing, SessionBuilder, Set};
pub use config::{
    AckCfg, DEV_THRESHOLD_MM, DetectionCfg, FALLBACK_DISTANCE_MM, MAX_ATTEMPTS, MotionCfg,
    RetryCfg, SamplingCfg, VAR_THRESHOLD_MM,
};
pub use detector::{DropClassifier, DropDetector, Verdict, VerdictReason, classify};
pub use error::{BuildError, DispenseError, EscalationReason};
pub use events::{DispenseEvent, EventSink, NullSink};
pub use prescription::{Hopper, HopperId, HopperSpec, HopperSummary, Patient, Prescription};
pub use retry::{RetryDecision, RetryPolicy};
pub use runner::{RunnerControl, SessionRunner, run_to_terminal};
pub use sampler::{SensorSample, SensorSampler};
pub use sequencer::next_target;
pub use session::{DispenseSession, Outcome};
pub use status::SessionState;

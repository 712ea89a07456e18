use thiserror::Error;

/// Why a session ended in `Escalated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationReason {
    /// The patient answered "no" on the verification screen.
    Rejected,
    /// Drop detection failed `attempts` times in a row on one hopper.
    MaxAttempts { hopper: String, attempts: u32 },
    /// Operator or host forced the session to stop.
    Aborted,
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscalationReason::Rejected => write!(f, "prescription rejected"),
            EscalationReason::MaxAttempts { hopper, attempts } => {
                write!(f, "no drop detected from {hopper} after {attempts} attempts")
            }
            EscalationReason::Aborted => write!(f, "dispense aborted"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispenseError {
    #[error("invalid prescription: {0}")]
    InvalidPrescription(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
    #[error("assistance requested: {0}")]
    Escalated(EscalationReason),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing distance sensor")]
    MissingSensor,
    #[error("missing servo")]
    MissingServo,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

//! Session state reported by every `step()`.

/// Where a `DispenseSession` is in its dispense cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No dispense in progress (a prescription may be waiting for confirmation).
    Idle,
    /// Taking the reference distance before the first actuation.
    MeasuringBaseline,
    /// About to run the active hopper's servo cycle.
    Actuating,
    /// About to sample the chute.
    Sampling,
    /// About to classify the last batch.
    Evaluating,
    /// Every hopper satisfied; waiting for acknowledgement.
    Success,
    /// Assistance requested; waiting for acknowledgement.
    Escalated,
}

impl SessionState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Success | SessionState::Escalated)
    }

    /// States in which exactly one hopper is active.
    #[inline]
    pub fn has_active_hopper(self) -> bool {
        matches!(
            self,
            SessionState::Actuating | SessionState::Sampling | SessionState::Evaluating
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::MeasuringBaseline => "measuring_baseline",
            SessionState::Actuating => "actuating",
            SessionState::Sampling => "sampling",
            SessionState::Evaluating => "evaluating",
            SessionState::Success => "success",
            SessionState::Escalated => "escalated",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

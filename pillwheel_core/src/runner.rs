//! Drivers that take a confirmed session to its terminal state.
//!
//! `run_to_terminal` steps on the caller's thread. `SessionRunner` moves the
//! session onto a worker thread, which then is the only owner of the sensor and
//! servos until `join()` hands the session back. Cross-thread control (abort,
//! acknowledge) goes through atomics polled by the worker before every step.
//!
//! Safety: each `SessionRunner` spawns exactly one thread. Dropping the runner
//! without joining raises the abort flag and waits for the worker to exit.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{DispenseError, Result};
use crate::session::{DispenseSession, Outcome};
use crate::status::SessionState;

/// Default pause between polls while a terminal screen is showing.
pub const ACK_POLL: Duration = Duration::from_millis(50);

/// Step `session` until it reaches `Success` or `Escalated`.
///
/// The session must have a confirmed prescription (or already be terminal).
pub fn run_to_terminal(session: &mut DispenseSession) -> std::result::Result<Outcome, DispenseError> {
    run_with_abort(session, &AtomicBool::new(false))
}

fn run_with_abort(
    session: &mut DispenseSession,
    abort: &AtomicBool,
) -> std::result::Result<Outcome, DispenseError> {
    let mut state = session.state();
    while !state.is_terminal() {
        if state == SessionState::Idle {
            return Err(DispenseError::State(if session.awaiting_confirmation() {
                "prescription has not been confirmed".to_string()
            } else {
                "no prescription loaded".to_string()
            }));
        }
        if abort.load(Ordering::Relaxed) {
            tracing::debug!("runner received abort signal");
            state = session.abort();
            continue;
        }
        state = session.step();
    }
    session
        .outcome()
        .cloned()
        .ok_or_else(|| DispenseError::State("terminal state without outcome".to_string()))
}

/// Handles shared between a `SessionRunner` and the threads that control it.
#[derive(Debug, Clone, Default)]
pub struct RunnerControl {
    abort: Arc<AtomicBool>,
    acknowledge: Arc<AtomicBool>,
}

impl RunnerControl {
    /// Escalate the session before its next step (no effect once terminal).
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    /// Dismiss the terminal screen without waiting out the ack window.
    pub fn acknowledge(&self) {
        self.acknowledge.store(true, Ordering::Relaxed);
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }
}

type WorkerResult = (DispenseSession, std::result::Result<Outcome, DispenseError>);

pub struct SessionRunner {
    control: RunnerControl,
    join_handle: Option<JoinHandle<WorkerResult>>,
}

impl SessionRunner {
    /// Move `session` onto a worker thread and run it to `Idle`.
    ///
    /// After the terminal state the worker waits for an acknowledgement (or the
    /// session's ack window), polling every `ack_poll` of session clock time.
    pub fn spawn(session: DispenseSession, ack_poll: Duration) -> Self {
        let control = RunnerControl::default();
        let worker_control = control.clone();

        let join_handle = std::thread::spawn(move || {
            let mut session = session;
            let result = run_with_abort(&mut session, &worker_control.abort);
            if result.is_ok() {
                wait_for_ack(&mut session, &worker_control, ack_poll);
            }
            tracing::trace!("runner thread exiting cleanly");
            (session, result)
        });

        Self {
            control,
            join_handle: Some(join_handle),
        }
    }

    pub fn control(&self) -> RunnerControl {
        self.control.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the worker and take the session back.
    pub fn join(mut self) -> Result<(DispenseSession, Outcome)> {
        let handle = self
            .join_handle
            .take()
            .ok_or_else(|| eyre::eyre!("runner already joined"))?;
        let (session, result) = handle
            .join()
            .map_err(|_| eyre::eyre!("runner thread panicked"))?;
        let outcome = result?;
        Ok((session, outcome))
    }
}

fn wait_for_ack(session: &mut DispenseSession, control: &RunnerControl, poll: Duration) {
    let clock = session.clock();
    while session.state().is_terminal() {
        if control.acknowledge.swap(false, Ordering::Relaxed) {
            // Only fails when not terminal, which the loop condition rules out.
            let _ = session.acknowledge();
            break;
        }
        if session.step() == SessionState::Idle {
            break;
        }
        clock.sleep(poll);
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            self.control.request_abort();
            self.control.acknowledge();
            if handle.join().is_err() {
                tracing::warn!("runner thread panicked during shutdown");
            }
        }
    }
}

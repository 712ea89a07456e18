//! Dispense execution: session assembly, verification prompt, event rendering.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use eyre::WrapErr;
use pillwheel_core::runner::ACK_POLL;
use pillwheel_core::{
    DispenseEvent, DispenseSession, EscalationReason, HopperActuator, HopperSummary, MotionCfg,
    Patient, Prescription, SessionRunner,
};
use pillwheel_traits::{Clock, ManualClock, MonotonicClock};
use pillwheel_ui::Presenter;
use serde_json::json;

use crate::hw::Hardware;

/// How the verification question gets answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Confirm,
    Reject,
    Prompt,
}

#[derive(Debug, Clone, Copy)]
pub struct DispenseOpts {
    pub verification: Verification,
    pub instant: bool,
    pub json: bool,
}

fn clock_for(instant: bool) -> Box<dyn Clock + Send + Sync> {
    if instant {
        Box::new(ManualClock::new())
    } else {
        Box::new(MonotonicClock::new())
    }
}

pub fn escalation_name(r: &EscalationReason) -> &'static str {
    match r {
        EscalationReason::Rejected => "Rejected",
        EscalationReason::MaxAttempts { .. } => "MaxAttempts",
        EscalationReason::Aborted => "Aborted",
    }
}

fn summary_json(h: &HopperSummary) -> serde_json::Value {
    json!({
        "hopper": h.id.index(),
        "label": h.label,
        "required": h.required,
        "dispensed": h.dispensed,
    })
}

/// One JSON object per event: `{"event": kind, ...}`.
pub fn event_json(ev: &DispenseEvent) -> serde_json::Value {
    let kind = ev.kind();
    match ev {
        DispenseEvent::CallingPatient {
            patient_id,
            patient_name,
        } => json!({ "event": kind, "patient_id": patient_id, "patient_name": patient_name }),
        DispenseEvent::AwaitingVerification { hopper_summaries } => json!({
            "event": kind,
            "hoppers": hopper_summaries.iter().map(summary_json).collect::<Vec<_>>(),
        }),
        DispenseEvent::Dispensing {
            active_hopper,
            attempt,
            of_max,
        } => json!({
            "event": kind,
            "hopper": summary_json(active_hopper),
            "attempt": attempt,
            "of_max": of_max,
        }),
        DispenseEvent::Actuated { hopper } => json!({ "event": kind, "hopper": hopper.index() }),
        DispenseEvent::Sampled {
            hopper,
            min_mm,
            max_mm,
        } => json!({ "event": kind, "hopper": hopper.index(), "min_mm": min_mm, "max_mm": max_mm }),
        DispenseEvent::DispenseSucceeded { per_hopper_counts } => json!({
            "event": kind,
            "hoppers": per_hopper_counts.iter().map(summary_json).collect::<Vec<_>>(),
        }),
        DispenseEvent::AssistanceRequested { reason } => json!({
            "event": kind,
            "reason": escalation_name(reason),
            "message": reason.to_string(),
        }),
        DispenseEvent::PrescriptionConfirmed | DispenseEvent::ReturnedToIdle => {
            json!({ "event": kind })
        }
    }
}

struct Output {
    presenter: Presenter,
    json: bool,
}

impl Output {
    fn show(&mut self, ev: &DispenseEvent) {
        if self.json {
            println!("{}", event_json(ev));
        } else if let Some(screen) = self.presenter.render(ev) {
            println!("{screen}\n");
        }
    }

    fn drain(&mut self, rx: &xch::Receiver<DispenseEvent>) {
        for ev in rx.try_iter() {
            self.show(&ev);
        }
    }
}

/// Patient's answer on the verification screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Yes,
    No,
    Interrupted,
}

fn parse_answer(line: &str) -> Answer {
    if matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
        Answer::Yes
    } else {
        Answer::No
    }
}

/// Wait for a line on `lines`, giving up as soon as `shutdown` is raised.
/// A closed channel (stdin at EOF) counts as "no".
fn await_answer(lines: &xch::Receiver<String>, shutdown: &AtomicBool) -> Answer {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return Answer::Interrupted;
        }
        match lines.recv_timeout(Duration::from_millis(50)) {
            Ok(line) => return parse_answer(&line),
            Err(xch::RecvTimeoutError::Timeout) => {}
            Err(xch::RecvTimeoutError::Disconnected) => return Answer::No,
        }
    }
}

fn prompt_yes_no(question: &str, shutdown: &AtomicBool) -> eyre::Result<Answer> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{question} [y/N] ")?;
    stdout.flush()?;

    // The reader stays blocked on stdin if Ctrl-C arrives first; it is
    // detached and ends with the process.
    let (tx, rx) = xch::bounded(1);
    std::thread::Builder::new()
        .name("verify-prompt".into())
        .spawn(move || {
            let mut line = String::new();
            if std::io::stdin().lock().read_line(&mut line).unwrap_or(0) > 0 {
                let _ = tx.send(line);
            }
        })
        .wrap_err("spawn verification prompt")?;
    Ok(await_answer(&rx, shutdown))
}

/// Run one session to completion. Returns per-hopper counts on success and
/// `DispenseError::Escalated` when assistance was requested.
pub fn run_dispense(
    cfg: &pillwheel_config::Config,
    opts: DispenseOpts,
    hw: Hardware,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<Vec<HopperSummary>> {
    let (tx, rx) = xch::unbounded();
    let mut session = DispenseSession::builder()
        .with_sensor(hw.sensor)
        .with_servo(hw.servo)
        .with_clock(clock_for(opts.instant))
        .with_config(cfg)
        .with_sink(tx)
        .build()?;

    let mut out = Output {
        presenter: Presenter::new(hw.status).with_patient(Patient::from(&cfg.patient)),
        json: opts.json,
    };
    if !opts.json {
        println!("{}\n", out.presenter.home());
    }

    session.start(Prescription::from(cfg))?;
    session.ready_for_collection()?;
    out.drain(&rx);

    let answer = match opts.verification {
        Verification::Confirm => Answer::Yes,
        Verification::Reject => Answer::No,
        Verification::Prompt => {
            prompt_yes_no("Is this the correct prescription and dose?", &shutdown)?
        }
    };
    match answer {
        Answer::Yes => {
            session.confirm_prescription()?;
        }
        Answer::No => {
            session.reject_prescription()?;
        }
        Answer::Interrupted => {
            tracing::warn!("shutdown requested at verification; aborting dispense");
            session.abort();
        }
    }
    tracing::info!(?answer, instant = opts.instant, "dispense start");

    let runner = SessionRunner::spawn(session, ACK_POLL);
    let control = runner.control();
    let mut abort_sent = false;
    while !runner.is_finished() {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(ev) => out.show(&ev),
            Err(xch::RecvTimeoutError::Timeout) => {}
            Err(xch::RecvTimeoutError::Disconnected) => break,
        }
        if !abort_sent && shutdown.load(Ordering::Relaxed) {
            tracing::warn!("shutdown requested; aborting dispense");
            control.request_abort();
            control.acknowledge();
            abort_sent = true;
        }
    }
    let (mut session, outcome) = runner.join()?;
    out.drain(&rx);
    session.park();

    let counts = outcome.into_result()?;
    if opts.json {
        println!(
            "{}",
            json!({
                "outcome": "success",
                "hoppers": counts.iter().map(summary_json).collect::<Vec<_>>(),
            })
        );
    }
    tracing::info!(hoppers = counts.len(), "dispense complete");
    Ok(counts)
}

/// Find a hopper by case-insensitive label or 0-based index.
pub fn find_hopper<'a>(
    hoppers: &'a [pillwheel_config::HopperCfg],
    key: &str,
) -> eyre::Result<&'a pillwheel_config::HopperCfg> {
    if let Some(h) = hoppers.iter().find(|h| h.label.eq_ignore_ascii_case(key)) {
        return Ok(h);
    }
    key.parse::<usize>()
        .ok()
        .and_then(|i| hoppers.get(i))
        .ok_or_else(|| eyre::eyre!("unknown hopper '{key}'"))
}

/// One actuator cycle on a single hopper.
pub fn run_test_servo(
    cfg: &pillwheel_config::Config,
    hopper: &str,
    hw: Hardware,
    json: bool,
) -> eyre::Result<()> {
    let h = find_hopper(&cfg.hoppers, hopper)?;
    let motion = MotionCfg::from(&cfg.motion);
    let (open, closed) = (motion.open_deg, motion.closed_deg);
    let mut actuator = HopperActuator::new(hw.servo, Arc::new(MonotonicClock::new()), motion);
    actuator.cycle(h.channel);
    actuator.park(&[h.channel]);
    let simulated = actuator.simulated_moves() > 0 || !hw.status.servos_ok;
    if json {
        println!(
            "{}",
            json!({ "test_servo": h.label, "channel": h.channel, "simulated": simulated })
        );
    } else {
        println!("{} Test Complete!", h.label);
        println!("Servo rotated {closed}° → {open}° → {closed}°");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_interrupts_a_pending_prompt() {
        // Nobody ever answers; the sender stays alive so the wait would block.
        let (_tx, rx) = xch::bounded::<String>(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let raiser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(120));
            flag.store(true, Ordering::Relaxed);
        });
        assert_eq!(await_answer(&rx, &shutdown), Answer::Interrupted);
        raiser.join().unwrap();
    }

    #[test]
    fn answers_are_read_from_the_line() {
        let shutdown = AtomicBool::new(false);
        for (line, want) in [
            ("y\n", Answer::Yes),
            (" YES \n", Answer::Yes),
            ("n\n", Answer::No),
            ("\n", Answer::No),
        ] {
            let (tx, rx) = xch::bounded(1);
            tx.send(line.to_string()).unwrap();
            assert_eq!(await_answer(&rx, &shutdown), want, "{line:?}");
        }
    }

    #[test]
    fn closed_stdin_counts_as_no() {
        let (tx, rx) = xch::bounded::<String>(1);
        drop(tx);
        assert_eq!(await_answer(&rx, &AtomicBool::new(false)), Answer::No);
    }
}

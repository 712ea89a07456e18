//! Human-readable error descriptions and structured JSON error formatting.

use crate::dispense::escalation_name;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use pillwheel_core::error::{BuildError, DispenseError, EscalationReason};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSensor => {
                "What happened: No distance sensor was provided to the dispenser.\nLikely causes: The ranging sensor (or its simulation) was not wired into the builder.\nHow to fix: Pass a sensor via with_sensor(...).".to_string()
            }
            BuildError::MissingServo => {
                "What happened: No servo was provided to the dispenser.\nLikely causes: The servo driver (or its simulation) was not wired into the builder.\nHow to fix: Pass a servo via with_servo(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/pillwheel.toml for a sample."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DispenseError>() {
        return match de {
            DispenseError::InvalidPrescription(msg) => format!(
                "What happened: The prescription cannot be dispensed ({msg}).\nLikely causes: No hoppers listed, or a hopper with required = 0.\nHow to fix: Give every hopper a required count of at least 1 in [[hoppers]] or the prescription CSV."
            ),
            DispenseError::Escalated(EscalationReason::Rejected) => {
                "What happened: The prescription was rejected at verification; assistance was requested.\nLikely causes: The wrong prescription was loaded, or the patient declined it.\nHow to fix: Review the prescription with a care worker and start a new session.".to_string()
            }
            DispenseError::Escalated(EscalationReason::MaxAttempts { hopper, attempts }) => format!(
                "What happened: No pill was detected from {hopper} after {attempts} attempts; assistance was requested.\nLikely causes: Empty or jammed hopper, misaligned ranging sensor, or detection thresholds too strict.\nHow to fix: Refill or clear the hopper, check the sensor alignment, or tune [detection] thresholds."
            ),
            DispenseError::Escalated(EscalationReason::Aborted) => {
                "What happened: Dispensing was aborted before it finished.\nLikely causes: Ctrl-C or an operator stop.\nHow to fix: Check the hoppers, then start a new session.".to_string()
            }
            DispenseError::Timeout => {
                "What happened: Distance sensor read timed out.\nLikely causes: VL53L0X not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify the I2C wiring and address, and consider increasing hardware.sensor_read_timeout_ms in the config.".to_string()
            }
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("prescription csv must have headers") {
        return "Invalid headers in prescription CSV. Expected 'label,channel,required'.".to_string();
    }

    if lower.contains("unknown hopper") {
        return format!(
            "What happened: {msg}.\nLikely causes: The label or index does not match any [[hoppers]] entry.\nHow to fix: Use a configured hopper label or its 0-based index."
        );
    }

    if lower.contains("must be") || lower.contains("is used twice") || lower.contains("toml") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: A missing, duplicated or out-of-range value.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("i2c") || lower.contains("model id") {
        return "What happened: Failed to talk to hardware on the I2C bus.\nLikely causes: Wrong bus or address, wiring issues, or insufficient permissions.\nHow to fix: Check [hardware] in the config and run with access to /dev/i2c-*.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Exit codes: 2 rejected, 3 max attempts, 4 aborted, 5 invalid prescription, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use pillwheel_core::error::{DispenseError, EscalationReason};
    match err.downcast_ref::<DispenseError>() {
        Some(DispenseError::Escalated(EscalationReason::Rejected)) => 2,
        Some(DispenseError::Escalated(EscalationReason::MaxAttempts { .. })) => 3,
        Some(DispenseError::Escalated(EscalationReason::Aborted)) => 4,
        Some(DispenseError::InvalidPrescription(_)) => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use pillwheel_core::error::{DispenseError, EscalationReason};
    use serde_json::json;

    let msg = humanize(err);
    match err.downcast_ref::<DispenseError>() {
        Some(DispenseError::Escalated(reason)) => {
            let name = escalation_name(reason);
            match reason {
                EscalationReason::MaxAttempts { hopper, attempts } => json!({
                    "reason": name,
                    "details": { "hopper": hopper, "attempts": attempts },
                    "message": msg,
                }),
                _ => json!({ "reason": name, "message": msg }),
            }
            .to_string()
        }
        Some(DispenseError::InvalidPrescription(detail)) => json!({
            "reason": "InvalidPrescription",
            "details": { "detail": detail },
            "message": msg,
        })
        .to_string(),
        // Generic error JSON
        _ => json!({ "reason": "Error", "message": msg }).to_string(),
    }
}

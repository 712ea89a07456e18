//! Prescriptions and the per-session hopper ledger.

use crate::error::DispenseError;

/// Position of a hopper in the prescription (declaration order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HopperId(pub usize);

impl HopperId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for HopperId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub instructions: Option<String>,
    pub next_dose: Option<String>,
}

impl Patient {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            instructions: None,
            next_dose: None,
        }
    }
}

/// One line of a prescription: which hopper, and how many units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopperSpec {
    pub label: String,
    /// Servo channel driving this hopper.
    pub channel: u8,
    pub required: u32,
}

impl HopperSpec {
    pub fn new(label: impl Into<String>, channel: u8, required: u32) -> Self {
        Self {
            label: label.into(),
            channel,
            required,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prescription {
    pub patient: Patient,
    /// Dispensing order is declaration order.
    pub hoppers: Vec<HopperSpec>,
}

impl Prescription {
    pub fn new(patient: Patient, hoppers: Vec<HopperSpec>) -> Self {
        Self { patient, hoppers }
    }

    /// Reject empty prescriptions and any hopper asking for zero units.
    pub fn validate(&self) -> Result<(), DispenseError> {
        if self.hoppers.is_empty() {
            return Err(DispenseError::InvalidPrescription(
                "prescription lists no hoppers".into(),
            ));
        }
        for (i, h) in self.hoppers.iter().enumerate() {
            if h.required < 1 {
                return Err(DispenseError::InvalidPrescription(format!(
                    "hopper {i} ({}) requires {} units; at least 1 is needed",
                    h.label, h.required
                )));
            }
        }
        Ok(())
    }
}

/// Live dispense progress for one hopper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hopper {
    pub id: HopperId,
    pub label: String,
    pub channel: u8,
    required: u32,
    dispensed: u32,
}

impl Hopper {
    pub(crate) fn from_spec(id: HopperId, spec: &HopperSpec) -> Self {
        Self {
            id,
            label: spec.label.clone(),
            channel: spec.channel,
            required: spec.required,
            dispensed: 0,
        }
    }

    /// Build a hopper with some units already dispensed (clamped to `required`).
    pub fn with_progress(id: HopperId, label: impl Into<String>, required: u32, dispensed: u32) -> Self {
        Self {
            id,
            label: label.into(),
            channel: u8::try_from(id.0).unwrap_or(u8::MAX),
            required,
            dispensed: dispensed.min(required),
        }
    }

    #[inline]
    pub fn required(&self) -> u32 {
        self.required
    }

    #[inline]
    pub fn dispensed(&self) -> u32 {
        self.dispensed
    }

    #[inline]
    pub fn is_satisfied(&self) -> bool {
        self.dispensed >= self.required
    }

    /// Count one confirmed unit. Refuses (returns false) once satisfied so
    /// `dispensed` never exceeds `required`.
    pub(crate) fn record_drop(&mut self) -> bool {
        if self.is_satisfied() {
            return false;
        }
        self.dispensed += 1;
        true
    }

    pub fn summary(&self) -> HopperSummary {
        HopperSummary {
            id: self.id,
            label: self.label.clone(),
            required: self.required,
            dispensed: self.dispensed,
        }
    }
}

/// Snapshot of a hopper handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopperSummary {
    pub id: HopperId,
    pub label: String,
    pub required: u32,
    pub dispensed: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rx(counts: &[u32]) -> Prescription {
        Prescription::new(
            Patient::new("001", "Patient 1"),
            counts
                .iter()
                .enumerate()
                .map(|(i, &n)| HopperSpec::new(format!("H{i}"), i as u8, n))
                .collect(),
        )
    }

    #[test]
    fn zero_count_is_invalid() {
        let err = rx(&[2, 0]).validate().unwrap_err();
        match err {
            DispenseError::InvalidPrescription(msg) => assert!(msg.contains("H1")),
            other => panic!("expected InvalidPrescription, got {other:?}"),
        }
    }

    #[test]
    fn empty_prescription_is_invalid() {
        assert!(matches!(
            rx(&[]).validate(),
            Err(DispenseError::InvalidPrescription(_))
        ));
    }

    #[test]
    fn record_drop_stops_at_required() {
        let mut h = Hopper::from_spec(HopperId(0), &HopperSpec::new("D", 0, 2));
        assert!(h.record_drop());
        assert!(h.record_drop());
        assert!(!h.record_drop());
        assert_eq!(h.dispensed(), 2);
        assert!(h.is_satisfied());
    }

    #[test]
    fn with_progress_clamps() {
        let h = Hopper::with_progress(HopperId(0), "D", 2, 7);
        assert_eq!(h.dispensed(), 2);
    }
}

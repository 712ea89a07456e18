//! Target selection.

use crate::prescription::{Hopper, HopperId};

/// First hopper, in declaration order, that still owes units.
pub fn next_target(hoppers: &[Hopper]) -> Option<HopperId> {
    hoppers.iter().find(|h| !h.is_satisfied()).map(|h| h.id)
}

/// True when every hopper has dispensed its required count.
pub fn all_satisfied(hoppers: &[Hopper]) -> bool {
    hoppers.iter().all(Hopper::is_satisfied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_satisfied_hoppers() {
        let hs = vec![
            Hopper::with_progress(HopperId(0), "D", 2, 2),
            Hopper::with_progress(HopperId(1), "C", 1, 0),
        ];
        assert_eq!(next_target(&hs), Some(HopperId(1)));
    }

    #[test]
    fn none_when_done() {
        let hs = vec![Hopper::with_progress(HopperId(0), "D", 1, 1)];
        assert_eq!(next_target(&hs), None);
        assert!(all_satisfied(&hs));
        assert!(all_satisfied(&[]));
    }
}

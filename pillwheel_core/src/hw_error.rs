//! Maps `Box<dyn Error>` from trait boundaries to typed `DispenseError`.
//!
//! The traits in `pillwheel_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `pillwheel_hardware::HwError` downcasting.

use crate::error::DispenseError;

/// Map a trait-boundary error to a typed `DispenseError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> DispenseError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<pillwheel_hardware::error::HwError>() {
            return match hw {
                pillwheel_hardware::error::HwError::Timeout
                | pillwheel_hardware::error::HwError::DataReadyTimeout => DispenseError::Timeout,
                other => DispenseError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        DispenseError::Timeout
    } else {
        DispenseError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::map_hw_error;
    use crate::error::DispenseError;

    #[test]
    fn string_timeout_maps_to_timeout() {
        let e = std::io::Error::other("ranging timeout");
        assert_eq!(map_hw_error(&e), DispenseError::Timeout);
    }

    #[test]
    fn other_errors_keep_message() {
        let e = std::io::Error::other("bus nack");
        assert_eq!(map_hw_error(&e), DispenseError::Hardware("bus nack".into()));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hw_errors_are_downcast() {
        use pillwheel_hardware::error::HwError;
        assert_eq!(
            map_hw_error(&HwError::DataReadyTimeout),
            DispenseError::Timeout
        );
        assert!(matches!(
            map_hw_error(&HwError::InvalidChannel(20)),
            DispenseError::HardwareFault(_)
        ));
    }
}

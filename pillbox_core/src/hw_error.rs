//! Maps `Box<dyn Error>` from trait boundaries to typed `CoreError`.
//!
//! The traits in `pillbox_traits` return `Box<dyn Error + Send + Sync>`; this
//! module turns those into our error enum, downcasting
//! `pillbox_hardware::HwError` when the `hardware-errors` feature is on.

use crate::error::CoreError;

/// Map a trait-boundary error to a typed `CoreError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CoreError {
    #[cfg(feature = "hardware-errors")]
    {
        use pillbox_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::DataReadyTimeout => CoreError::Timeout,
                other => CoreError::HardwareFault(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CoreError::Timeout
    } else {
        CoreError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Opaque(&'static str);
    impl std::fmt::Display for Opaque {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }
    impl std::error::Error for Opaque {}

    #[test]
    fn falls_back_to_message_heuristics() {
        assert!(matches!(
            map_hw_error(&Opaque("bus Timeout after 5ms")),
            CoreError::Timeout
        ));
        assert!(matches!(
            map_hw_error(&Opaque("i2c nack")),
            CoreError::Hardware(s) if s == "i2c nack"
        ));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn downcasts_hardware_errors() {
        use pillbox_hardware::error::HwError;
        assert!(matches!(
            map_hw_error(&HwError::DataReadyTimeout),
            CoreError::Timeout
        ));
        assert!(matches!(
            map_hw_error(&HwError::Gpio("pin 4 busy".into())),
            CoreError::HardwareFault(_)
        ));
    }
}

use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Block until `is_high` reports the line low, or fail once `timeout` expires.
/// Sleeps `poll_interval` between checks instead of spinning.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while is_high() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Servo pulse width in microseconds for an angle in 0..=180 on a
/// standard 500..2500 us hobby servo.
#[inline]
pub fn servo_pulse_us(angle: u8) -> u64 {
    let a = u64::from(angle.min(180));
    500 + a * 2000 / 180
}

//! Numeric keypad entry as a pure state transition.

use chrono::{NaiveDate, NaiveDateTime};
use pillbox_traits::Key;

/// Digits of a `DDMMYYYYHHMMSS` clock entry.
pub const CLOCK_ENTRY_DIGITS: usize = 14;

/// Fixed-capacity digit accumulator.
///
/// Digits past capacity are ignored, `Clear` empties the buffer, and
/// `Confirm` has no effect on a numeric entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitBuffer {
    digits: String,
    capacity: usize,
}

impl DigitBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            digits: String::with_capacity(capacity),
            capacity,
        }
    }

    #[must_use]
    pub fn apply(mut self, key: Key) -> Self {
        match key {
            Key::Digit(d) if d <= 9 && self.digits.len() < self.capacity => {
                self.digits.push(char::from(b'0' + d));
            }
            Key::Clear => self.digits.clear(),
            Key::Digit(_) | Key::Confirm => {}
        }
        self
    }

    pub fn is_complete(&self) -> bool {
        self.digits.len() == self.capacity
    }

    /// Typed digits so far, for echoing.
    pub fn as_str(&self) -> &str {
        &self.digits
    }

    /// Numeric value once complete.
    pub fn value(&self) -> Option<u32> {
        if self.is_complete() {
            self.digits.parse().ok()
        } else {
            None
        }
    }
}

/// Parse a complete `DDMMYYYYHHMMSS` entry into a calendar date-time.
pub fn parse_clock_entry(digits: &str) -> Option<NaiveDateTime> {
    if digits.len() != CLOCK_ENTRY_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = |range: std::ops::Range<usize>| digits.get(range)?.parse::<u32>().ok();
    let day = field(0..2)?;
    let month = field(2..4)?;
    let year = i32::try_from(field(4..8)?).ok()?;
    let hour = field(8..10)?;
    let minute = field(10..12)?;
    let second = field(12..14)?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

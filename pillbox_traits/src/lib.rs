//! Collaborator boundaries for the dispenser controller.
//!
//! Everything the control loop touches in the outside world goes through one
//! of these traits: the monotonic clock, the real-time clock, door servos,
//! load cells, the keypad, the status display, the alert indicator, and the
//! outbound notifier.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use chrono::NaiveDateTime;
use std::time::Duration;

/// Discrete key events produced by the input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A numeric key, 0..=9.
    Digit(u8),
    /// Discards the current partial entry.
    Clear,
    /// Confirms / toggles, depending on the active phase.
    Confirm,
}

impl Key {
    /// Map a keypad legend to a key. `*` clears, `A` and `#` confirm.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0'..='9' => c.to_digit(10).map(|d| Key::Digit(d as u8)),
            '*' => Some(Key::Clear),
            'A' | 'a' | '#' => Some(Key::Confirm),
            _ => None,
        }
    }
}

/// RGB colour for the alert indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const OFF: Color = Color::rgb(0, 0, 0);
    /// Temperature excursion.
    pub const RED: Color = Color::rgb(255, 0, 0);
    /// Dose ready.
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    /// Low stock.
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    /// Medicine taken.
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);
    /// Hardware or delivery fault.
    pub const YELLOW: Color = Color::rgb(255, 255, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Battery-backed wall clock with an on-die temperature sensor.
pub trait RealTimeClock {
    /// Verify the device answers; an error means the clock is absent.
    fn probe(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// Whether the clock lost power and needs the time set again.
    fn lost_power(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
    fn now(&mut self) -> Result<NaiveDateTime, Box<dyn std::error::Error + Send + Sync>>;
    fn adjust(
        &mut self,
        at: NaiveDateTime,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// Ambient temperature in degrees Celsius.
    fn temperature(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>>;
}

/// Weight sensor under a container.
pub trait LoadCell {
    /// Read the current weight. `Ok(None)` means no fresh sample is ready yet.
    fn read(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<f32>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Positional door actuator addressed in whole degrees.
pub trait Servo {
    /// Last commanded angle.
    fn position(&self) -> u8;
    fn write(&mut self, angle: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Non-blocking key source.
pub trait Keypad {
    /// Next pending key, if any. Absence of a key is not an error.
    fn poll(&mut self) -> Option<Key>;
}

/// Two-line, fixed-width, write-only status sink.
pub trait StatusDisplay {
    fn show(&mut self, top: &str, bottom: &str);
}

/// Visual and audible alert outputs.
pub trait Indicator {
    fn set_color(&mut self, color: Color);
    fn set_buzzer(&mut self, on: bool);
}

/// One-way outbound message transport.
pub trait Notifier {
    fn notify(
        &mut self,
        recipient: &str,
        message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

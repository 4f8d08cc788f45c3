//! Fixed-width status display wrapper.

use pillbox_traits::StatusDisplay;

/// Columns on each display line.
pub const WIDTH: usize = 16;

/// Truncate `s` to the display width.
pub fn fit(s: &str) -> String {
    s.chars().take(WIDTH).collect()
}

/// Two-decimal Celsius reading, e.g. `24.50C`.
pub fn celsius(t: f32) -> String {
    format!("{t:.2}C")
}

pub struct Screen {
    display: Box<dyn StatusDisplay>,
}

impl Screen {
    pub fn new(display: Box<dyn StatusDisplay>) -> Self {
        Self { display }
    }

    pub fn show(&mut self, top: &str, bottom: &str) {
        self.display.show(&fit(top), &fit(bottom));
    }
}

//! Indicator colour and buzzer patterns.

use std::sync::Arc;
use std::time::Duration;

use pillbox_traits::{Clock, Color, Indicator};

pub struct AlertDriver {
    indicator: Box<dyn Indicator>,
    clock: Arc<dyn Clock + Send + Sync>,
    pulse: Duration,
}

impl AlertDriver {
    pub fn new(
        indicator: Box<dyn Indicator>,
        clock: Arc<dyn Clock + Send + Sync>,
        pulse: Duration,
    ) -> Self {
        Self {
            indicator,
            clock,
            pulse,
        }
    }

    pub fn color(&mut self, color: Color) {
        self.indicator.set_color(color);
    }

    /// `n` buzzer cycles of one pulse on, one pulse off. Blocks for `2 * n` pulses.
    pub fn pulse(&mut self, n: u32) {
        for _ in 0..n {
            self.indicator.set_buzzer(true);
            self.clock.sleep(self.pulse);
            self.indicator.set_buzzer(false);
            self.clock.sleep(self.pulse);
        }
    }

    /// Colour on, one buzz held for a single pulse, then everything off.
    pub fn flash(&mut self, color: Color) {
        self.indicator.set_color(color);
        self.indicator.set_buzzer(true);
        self.clock.sleep(self.pulse);
        self.indicator.set_buzzer(false);
        self.indicator.set_color(Color::OFF);
    }

    pub fn off(&mut self) {
        self.indicator.set_buzzer(false);
        self.indicator.set_color(Color::OFF);
    }
}

//! Simulated peripherals for host runs and tests.
//!
//! Each device hands out a cloneable probe sharing its state, so a test (or
//! the CLI) can change weight, temperature, or queued keys while the
//! controller owns the boxed device.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use pillbox_traits::{
    Clock, Color, Indicator, Key, Keypad, LoadCell, Notifier, RealTimeClock, Servo, StatusDisplay,
};

use crate::error::HwError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ── Load cell ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WeightProbe {
    grams: Rc<Cell<f32>>,
    ready: Rc<Cell<bool>>,
    failing: Rc<Cell<bool>>,
}

impl WeightProbe {
    pub fn set(&self, grams: f32) {
        self.grams.set(grams);
    }
    /// When false, reads report "no fresh sample".
    pub fn set_ready(&self, ready: bool) {
        self.ready.set(ready);
    }
    /// When true, reads fail with a timeout.
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }
}

/// Load cell whose weight is whatever the probe last set.
pub struct SimulatedLoadCell {
    probe: WeightProbe,
}

impl SimulatedLoadCell {
    pub fn new(grams: f32) -> Self {
        Self {
            probe: WeightProbe {
                grams: Rc::new(Cell::new(grams)),
                ready: Rc::new(Cell::new(true)),
                failing: Rc::new(Cell::new(false)),
            },
        }
    }

    pub fn probe(&self) -> WeightProbe {
        self.probe.clone()
    }
}

impl LoadCell for SimulatedLoadCell {
    fn read(&mut self, _timeout: Duration) -> Result<Option<f32>, BoxError> {
        if self.probe.failing.get() {
            return Err(Box::new(HwError::Timeout));
        }
        if !self.probe.ready.get() {
            return Ok(None);
        }
        let w = self.probe.grams.get();
        tracing::trace!(weight = w, "load cell sample (simulated)");
        Ok(Some(w))
    }
}

// ── Servo ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServoProbe {
    angle: Rc<Cell<u8>>,
    writes: Rc<RefCell<Vec<u8>>>,
    failing: Rc<Cell<bool>>,
}

impl ServoProbe {
    pub fn angle(&self) -> u8 {
        self.angle.get()
    }
    /// Every angle written since construction, in order.
    pub fn writes(&self) -> Vec<u8> {
        self.writes.borrow().clone()
    }
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }
}

/// Servo that records each commanded angle.
pub struct SimulatedServo {
    probe: ServoProbe,
}

impl SimulatedServo {
    pub fn new(initial_angle: u8) -> Self {
        Self {
            probe: ServoProbe {
                angle: Rc::new(Cell::new(initial_angle)),
                writes: Rc::new(RefCell::new(Vec::new())),
                failing: Rc::new(Cell::new(false)),
            },
        }
    }

    pub fn probe(&self) -> ServoProbe {
        self.probe.clone()
    }
}

impl Servo for SimulatedServo {
    fn position(&self) -> u8 {
        self.probe.angle.get()
    }

    fn write(&mut self, angle: u8) -> Result<(), BoxError> {
        if self.probe.failing.get() {
            return Err(Box::new(HwError::Gpio("servo pwm unavailable".into())));
        }
        self.probe.angle.set(angle);
        self.probe.writes.borrow_mut().push(angle);
        Ok(())
    }
}

// ── Real-time clock ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RtcProbe {
    temperature_c: Rc<Cell<f32>>,
    adjusted_to: Rc<Cell<Option<NaiveDateTime>>>,
}

impl RtcProbe {
    pub fn set_temperature(&self, c: f32) {
        self.temperature_c.set(c);
    }
    /// Last value written through `adjust`, if any.
    pub fn adjusted_to(&self) -> Option<NaiveDateTime> {
        self.adjusted_to.get()
    }
}

/// Wall clock that advances with a monotonic `Clock`.
///
/// Sharing a `ManualClock` with the controller makes wall time follow every
/// simulated sleep.
pub struct SimulatedRtc {
    clock: Arc<dyn Clock + Send + Sync>,
    base: NaiveDateTime,
    epoch: Instant,
    lost_power: bool,
    present: bool,
    probe: RtcProbe,
}

impl SimulatedRtc {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>, start: NaiveDateTime, ambient_c: f32) -> Self {
        let epoch = clock.now();
        Self {
            clock,
            base: start,
            epoch,
            lost_power: false,
            present: true,
            probe: RtcProbe {
                temperature_c: Rc::new(Cell::new(ambient_c)),
                adjusted_to: Rc::new(Cell::new(None)),
            },
        }
    }

    /// Report lost power until the time is set again.
    pub fn with_lost_power(mut self) -> Self {
        self.lost_power = true;
        self
    }

    /// Behave as if no clock is wired.
    pub fn absent(mut self) -> Self {
        self.present = false;
        self
    }

    pub fn probe(&self) -> RtcProbe {
        self.probe.clone()
    }

    fn ensure_present(&self) -> Result<(), BoxError> {
        if self.present {
            Ok(())
        } else {
            Err(Box::new(HwError::NotReady))
        }
    }
}

impl RealTimeClock for SimulatedRtc {
    fn probe(&mut self) -> Result<(), BoxError> {
        self.ensure_present()
    }

    fn lost_power(&mut self) -> Result<bool, BoxError> {
        self.ensure_present()?;
        Ok(self.lost_power)
    }

    fn now(&mut self) -> Result<NaiveDateTime, BoxError> {
        self.ensure_present()?;
        let elapsed = chrono::Duration::milliseconds(self.clock.ms_since(self.epoch) as i64);
        Ok(self.base + elapsed)
    }

    fn adjust(&mut self, at: NaiveDateTime) -> Result<(), BoxError> {
        self.ensure_present()?;
        self.base = at;
        self.epoch = self.clock.now();
        self.lost_power = false;
        self.probe.adjusted_to.set(Some(at));
        Ok(())
    }

    fn temperature(&mut self) -> Result<f32, BoxError> {
        self.ensure_present()?;
        Ok(self.probe.temperature_c.get())
    }
}

// ── Keypad ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct KeyQueue {
    keys: Rc<RefCell<VecDeque<Key>>>,
}

impl KeyQueue {
    pub fn push(&self, key: Key) {
        self.keys.borrow_mut().push_back(key);
    }

    /// Queue every recognised legend in `script`; other characters are skipped.
    pub fn push_script(&self, script: &str) {
        let mut q = self.keys.borrow_mut();
        q.extend(script.chars().filter_map(Key::from_char));
    }

    pub fn pending(&self) -> usize {
        self.keys.borrow().len()
    }
}

/// Keypad fed from a script or a test-owned queue.
#[derive(Default)]
pub struct ScriptedKeypad {
    queue: KeyQueue,
}

impl ScriptedKeypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_script(script: &str) -> Self {
        let kp = Self::default();
        kp.queue.push_script(script);
        kp
    }

    pub fn queue(&self) -> KeyQueue {
        self.queue.clone()
    }
}

impl Keypad for ScriptedKeypad {
    fn poll(&mut self) -> Option<Key> {
        self.queue.keys.borrow_mut().pop_front()
    }
}

// ── Display ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct DisplayProbe {
    frames: Rc<RefCell<Vec<(String, String)>>>,
}

impl DisplayProbe {
    pub fn frames(&self) -> Vec<(String, String)> {
        self.frames.borrow().clone()
    }

    pub fn last(&self) -> Option<(String, String)> {
        self.frames.borrow().last().cloned()
    }

    /// Whether any frame so far contained `needle` on either line.
    pub fn saw(&self, needle: &str) -> bool {
        self.frames
            .borrow()
            .iter()
            .any(|(t, b)| t.contains(needle) || b.contains(needle))
    }
}

/// Display that keeps distinct consecutive frames and optionally echoes them.
#[derive(Default)]
pub struct SimulatedDisplay {
    probe: DisplayProbe,
    echo: bool,
}

impl SimulatedDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print each new frame to stdout as `[top|bottom]`.
    pub fn echo(mut self, on: bool) -> Self {
        self.echo = on;
        self
    }

    pub fn probe(&self) -> DisplayProbe {
        self.probe.clone()
    }
}

impl StatusDisplay for SimulatedDisplay {
    fn show(&mut self, top: &str, bottom: &str) {
        let mut frames = self.probe.frames.borrow_mut();
        if frames
            .last()
            .is_some_and(|(t, b)| t == top && b == bottom)
        {
            return;
        }
        tracing::debug!(top, bottom, "display");
        if self.echo {
            println!("[{top:<16}|{bottom:<16}]");
        }
        frames.push((top.to_string(), bottom.to_string()));
    }
}

// ── Indicator ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IndicatorProbe {
    color: Rc<Cell<Color>>,
    colors_seen: Rc<RefCell<Vec<Color>>>,
    buzzes: Rc<Cell<u32>>,
}

impl IndicatorProbe {
    pub fn color(&self) -> Color {
        self.color.get()
    }
    pub fn saw_color(&self, c: Color) -> bool {
        self.colors_seen.borrow().contains(&c)
    }
    /// Number of off→on buzzer transitions.
    pub fn buzzes(&self) -> u32 {
        self.buzzes.get()
    }
}

pub struct SimulatedIndicator {
    probe: IndicatorProbe,
    buzzer_on: bool,
}

impl Default for SimulatedIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedIndicator {
    pub fn new() -> Self {
        Self {
            probe: IndicatorProbe {
                color: Rc::new(Cell::new(Color::OFF)),
                colors_seen: Rc::new(RefCell::new(Vec::new())),
                buzzes: Rc::new(Cell::new(0)),
            },
            buzzer_on: false,
        }
    }

    pub fn probe(&self) -> IndicatorProbe {
        self.probe.clone()
    }
}

impl Indicator for SimulatedIndicator {
    fn set_color(&mut self, color: Color) {
        if self.probe.color.get() != color {
            tracing::trace!(r = color.r, g = color.g, b = color.b, "indicator colour");
        }
        self.probe.color.set(color);
        self.probe.colors_seen.borrow_mut().push(color);
    }

    fn set_buzzer(&mut self, on: bool) {
        if on && !self.buzzer_on {
            self.probe.buzzes.set(self.probe.buzzes.get() + 1);
        }
        self.buzzer_on = on;
    }
}

// ── Notifier ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct OutboxProbe {
    sent: Rc<RefCell<Vec<(String, String)>>>,
    failing: Rc<Cell<bool>>,
}

impl OutboxProbe {
    /// Successfully delivered (recipient, message) pairs.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.borrow().clone()
    }
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }
}

/// Notifier that logs and records each message instead of transmitting it.
#[derive(Default)]
pub struct LogNotifier {
    probe: OutboxProbe,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> OutboxProbe {
        self.probe.clone()
    }
}

impl Notifier for LogNotifier {
    fn notify(&mut self, recipient: &str, message: &str) -> Result<(), BoxError> {
        if self.probe.failing.get() {
            return Err(Box::new(HwError::Io(std::io::Error::other(
                "modem did not acknowledge",
            ))));
        }
        tracing::info!(recipient, message, "notification sent (simulated)");
        self.probe
            .sent
            .borrow_mut()
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

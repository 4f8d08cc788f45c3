//! Type-state builder for `SessionController`.
//!
//! The real-time clock, keypad, and door servos must be provided before
//! `build()` is available. `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use pillbox_traits::{
    Clock, Indicator, Keypad, LoadCell, MonotonicClock, Notifier, RealTimeClock, Servo,
    StatusDisplay,
};

use crate::CONTAINER_COUNT;
use crate::actuator::ActuatorCoordinator;
use crate::alert::AlertDriver;
use crate::config::{ConsumptionCfg, DoorGeometry, NotifyCfg, Timeouts, TimingCfg};
use crate::consumption::ConsumptionMonitor;
use crate::container::{ContainerId, ContainerSetup, Containers};
use crate::controller::{Parts, SessionController};
use crate::error::{BuildError, Result};
use crate::mocks::{NoopDisplay, NoopIndicator, NoopNotifier};
use crate::notifier::NotifierGateway;
use crate::screen::Screen;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Everything optional, shared by every type-state.
#[derive(Default)]
struct Pending {
    rtc: Option<Box<dyn RealTimeClock>>,
    keypad: Option<Box<dyn Keypad>>,
    servos: Option<Vec<Box<dyn Servo>>>,
    display: Option<Box<dyn StatusDisplay>>,
    indicator: Option<Box<dyn Indicator>>,
    notifier: Option<Box<dyn Notifier>>,
    load_cells: Vec<Option<Box<dyn LoadCell>>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    preset: Option<Vec<ContainerSetup>>,
    timing: Option<TimingCfg>,
    consumption: Option<ConsumptionCfg>,
    doors: Option<Vec<DoorGeometry>>,
    notify: Option<NotifyCfg>,
    timeouts: Option<Timeouts>,
}

/// Builder for `SessionController`. All fields are validated on `build()`.
pub struct SessionBuilder<R, K, S> {
    pending: Pending,
    _r: PhantomData<R>,
    _k: PhantomData<K>,
    _s: PhantomData<S>,
}

impl Default for SessionBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            pending: Pending::default(),
            _r: PhantomData,
            _k: PhantomData,
            _s: PhantomData,
        }
    }
}

impl SessionController {
    /// Start building a controller.
    pub fn builder() -> SessionBuilder<Missing, Missing, Missing> {
        SessionBuilder::default()
    }
}

impl<R, K, S> SessionBuilder<R, K, S> {
    fn retype<R2, K2, S2>(self) -> SessionBuilder<R2, K2, S2> {
        SessionBuilder {
            pending: self.pending,
            _r: PhantomData,
            _k: PhantomData,
            _s: PhantomData,
        }
    }

    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<SessionController> {
        let p = self.pending;
        let rtc = p
            .rtc
            .ok_or_else(|| eyre::Report::new(BuildError::MissingClock))?;
        let keypad = p
            .keypad
            .ok_or_else(|| eyre::Report::new(BuildError::MissingKeypad))?;
        let servos = p
            .servos
            .ok_or_else(|| eyre::Report::new(BuildError::MissingServos))?;

        let timing = p.timing.unwrap_or_default();
        let consumption = p.consumption.unwrap_or_default();
        let timeouts = p.timeouts.unwrap_or_default();
        let doors = match p.doors {
            Some(d) => d,
            None => DoorGeometry::factory().to_vec(),
        };

        // ── Validation ───────────────────────────────────────────────────────
        if servos.len() != CONTAINER_COUNT {
            return Err(invalid("exactly five door servos are required"));
        }
        let doors: [DoorGeometry; CONTAINER_COUNT] = doors
            .try_into()
            .map_err(|_| invalid("exactly five door geometries are required"))?;
        if doors
            .iter()
            .any(|g| g.open_angle > 180 || g.close_angle > 180)
        {
            return Err(invalid("door angles must be within 0..=180"));
        }
        if doors.iter().any(|g| g.open_angle == g.close_angle) {
            return Err(invalid("door open and close angles must differ"));
        }
        if timing.poll_interval_ms == 0
            || timing.dispense_window_ms == 0
            || timing.servo_step_ms == 0
            || timing.key_poll_ms == 0
        {
            return Err(invalid("timing intervals must be >= 1 ms"));
        }
        if !consumption.low_stock_floor.is_finite() || consumption.low_stock_floor < 0.0 {
            return Err(invalid("low_stock_floor must be >= 0"));
        }
        if !consumption.consumed_delta.is_finite() || consumption.consumed_delta <= 0.0 {
            return Err(invalid("consumed_delta must be > 0"));
        }
        if timeouts.sensor_ms == 0 {
            return Err(invalid("sensor_ms must be >= 1"));
        }
        if p.preset.as_ref().is_some_and(|s| s.len() != CONTAINER_COUNT) {
            return Err(invalid("preset must cover all five containers"));
        }

        // ── Assemble ─────────────────────────────────────────────────────────
        let clock: Arc<dyn Clock + Send + Sync> = match p.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let monitor = ConsumptionMonitor::new(p.load_cells, consumption, &timeouts);
        let containers = Containers::new(doors, monitor.sensor_map());
        let actuator = ActuatorCoordinator::new(
            servos,
            clock.clone(),
            Duration::from_millis(timing.servo_step_ms),
        );
        let alerts = AlertDriver::new(
            p.indicator.unwrap_or_else(|| Box::new(NoopIndicator)),
            clock.clone(),
            Duration::from_millis(timing.pulse_ms),
        );
        let notifier = NotifierGateway::new(
            p.notifier.unwrap_or_else(|| Box::new(NoopNotifier)),
            p.notify.unwrap_or_default(),
        );
        let screen = Screen::new(p.display.unwrap_or_else(|| Box::new(NoopDisplay)));

        Ok(SessionController::from_parts(Parts {
            containers,
            rtc,
            keypad,
            screen,
            alerts,
            actuator,
            consumption: monitor,
            notifier,
            clock,
            timing,
            preset: p.preset,
        }))
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Chainable setters that do not affect type-state.
impl<R, K, S> SessionBuilder<R, K, S> {
    pub fn with_display(mut self, display: impl StatusDisplay + 'static) -> Self {
        self.pending.display = Some(Box::new(display));
        self
    }
    pub fn with_indicator(mut self, indicator: impl Indicator + 'static) -> Self {
        self.pending.indicator = Some(Box::new(indicator));
        self
    }
    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.pending.notifier = Some(Box::new(notifier));
        self
    }
    /// Fit a load cell under `container`, making it sensor-bearing.
    pub fn with_load_cell(mut self, container: ContainerId, cell: impl LoadCell + 'static) -> Self {
        let cells = &mut self.pending.load_cells;
        if cells.len() <= container.index() {
            cells.resize_with(container.index() + 1, || None);
        }
        cells[container.index()] = Some(Box::new(cell));
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.pending.clock = Some(clock);
        self
    }
    /// Install all five container setups up front. The welcome confirm then
    /// goes straight to monitoring.
    pub fn with_preset(mut self, setups: Vec<ContainerSetup>) -> Self {
        self.pending.preset = Some(setups);
        self
    }
    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.pending.timing = Some(timing);
        self
    }
    pub fn with_consumption(mut self, consumption: ConsumptionCfg) -> Self {
        self.pending.consumption = Some(consumption);
        self
    }
    /// Per-container door geometry, in container order.
    pub fn with_doors(mut self, doors: Vec<DoorGeometry>) -> Self {
        self.pending.doors = Some(doors);
        self
    }
    pub fn with_notify(mut self, notify: NotifyCfg) -> Self {
        self.pending.notify = Some(notify);
        self
    }
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.pending.timeouts = Some(timeouts);
        self
    }
    /// Apply every runtime setting from a validated file config.
    pub fn with_config(self, cfg: &pillbox_config::Config) -> Self {
        self.with_timing(TimingCfg::from(&cfg.timing))
            .with_consumption(ConsumptionCfg::from(&cfg.consumption))
            .with_doors(cfg.containers.iter().map(DoorGeometry::from).collect())
            .with_notify(NotifyCfg::from(&cfg.notifier))
            .with_timeouts(Timeouts::from(&cfg.hardware))
    }
}

// Setters that advance type-state
impl<K, S> SessionBuilder<Missing, K, S> {
    pub fn with_rtc(mut self, rtc: impl RealTimeClock + 'static) -> SessionBuilder<Set, K, S> {
        self.pending.rtc = Some(Box::new(rtc));
        self.retype()
    }
}

impl<R, S> SessionBuilder<R, Missing, S> {
    pub fn with_keypad(mut self, keypad: impl Keypad + 'static) -> SessionBuilder<R, Set, S> {
        self.pending.keypad = Some(Box::new(keypad));
        self.retype()
    }
}

impl<R, K> SessionBuilder<R, K, Missing> {
    /// One servo per container, in container order.
    pub fn with_servos(mut self, servos: Vec<Box<dyn Servo>>) -> SessionBuilder<R, K, Set> {
        self.pending.servos = Some(servos);
        self.retype()
    }
}

impl SessionBuilder<Set, Set, Set> {
    /// Validate and build. Only available once clock, keypad, and servos are set.
    pub fn build(self) -> Result<SessionController> {
        self.try_build()
    }
}

//! The session controller: one cooperative state machine that ties the
//! schedule, safety, actuator, consumption, and notifier services together.
//!
//! Every call to [`SessionController::poll`] runs exactly one iteration of the
//! control loop to completion. All waits go through the injected `Clock`, so a
//! manual clock replays hours of operation instantly.
//!
//! Within a monitoring tick the order is fixed: temperature check, then
//! schedule evaluation, then door motion, then consumption sampling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use pillbox_traits::{Clock, Color, Key, Keypad, RealTimeClock};

use crate::CONTAINER_COUNT;
use crate::actuator::{ActuatorCoordinator, DoorTarget};
use crate::alert::AlertDriver;
use crate::config::TimingCfg;
use crate::consumption::{Consumption, ConsumptionMonitor};
use crate::container::{ContainerId, ContainerSetup, Containers};
use crate::error::{CoreError, Result};
use crate::hw_error::map_hw_error;
use crate::input::{CLOCK_ENTRY_DIGITS, DigitBuffer, parse_clock_entry};
use crate::notifier::{Delivery, NotifierGateway};
use crate::safety::{SafetyMonitor, SafetyStatus};
use crate::schedule::{DoseTime, Schedule, ScheduleEngine};
use crate::screen::{Screen, celsius};
use crate::status::{PhaseKind, SessionStats};

const DATE_PROMPT: &str = "Enter Date&Time:";
const DATE_FORMAT: &str = "DDMMYYYYHHMMSS";

/// Which value the configure phase is collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigStep {
    DoseCount,
    Hour { index: u8, count: u8 },
    Minute { index: u8, count: u8, hour: u8 },
    MaxTemp,
}

impl ConfigStep {
    fn digits(self) -> usize {
        match self {
            ConfigStep::DoseCount => 1,
            ConfigStep::Hour { .. } | ConfigStep::Minute { .. } | ConfigStep::MaxTemp => 2,
        }
    }

    fn prompt(self, id: ContainerId) -> String {
        match self {
            ConfigStep::DoseCount => "Times per day:".to_string(),
            ConfigStep::Hour { index, .. } => format!("Time {} Hour:", index + 1),
            ConfigStep::Minute { index, .. } => format!("Time {} Minute:", index + 1),
            ConfigStep::MaxTemp => format!("Max Temp {id}:"),
        }
    }
}

enum Phase {
    /// Not started yet.
    Idle,
    SetClock {
        entry: DigitBuffer,
    },
    Welcome,
    Configure {
        id: ContainerId,
        step: ConfigStep,
        entry: DigitBuffer,
        schedule: Schedule,
    },
    Monitoring,
    Dispensing {
        since: Instant,
        /// Set once the window ended but a ready door refused to close.
        closing: bool,
    },
    Halted {
        reason: String,
    },
}

impl Phase {
    fn kind(&self) -> Option<PhaseKind> {
        Some(match self {
            Phase::Idle => return None,
            Phase::SetClock { .. } => PhaseKind::SetClock,
            Phase::Welcome => PhaseKind::Welcome,
            Phase::Configure { .. } => PhaseKind::Configure,
            Phase::Monitoring => PhaseKind::Monitoring,
            Phase::Dispensing { .. } => PhaseKind::Dispensing,
            Phase::Halted { .. } => PhaseKind::Halted,
        })
    }
}

/// Collaborators and settings handed over by the builder.
pub(crate) struct Parts {
    pub containers: Containers,
    pub rtc: Box<dyn RealTimeClock>,
    pub keypad: Box<dyn Keypad>,
    pub screen: Screen,
    pub alerts: AlertDriver,
    pub actuator: ActuatorCoordinator,
    pub consumption: ConsumptionMonitor,
    pub notifier: NotifierGateway,
    pub clock: Arc<dyn Clock + Send + Sync>,
    pub timing: TimingCfg,
    pub preset: Option<Vec<ContainerSetup>>,
}

pub struct SessionController {
    containers: Containers,
    rtc: Box<dyn RealTimeClock>,
    keypad: Box<dyn Keypad>,
    screen: Screen,
    alerts: AlertDriver,
    actuator: ActuatorCoordinator,
    consumption: ConsumptionMonitor,
    safety: SafetyMonitor,
    schedule: ScheduleEngine,
    notifier: NotifierGateway,
    clock: Arc<dyn Clock + Send + Sync>,
    timing: TimingCfg,
    preset_loaded: bool,
    phase: Phase,
    stats: SessionStats,
    low_stock: [bool; CONTAINER_COUNT],
}

impl SessionController {
    pub(crate) fn from_parts(p: Parts) -> Self {
        let mut containers = p.containers;
        let preset_loaded = p.preset.is_some();
        if let Some(setups) = p.preset {
            for (id, setup) in ContainerId::all().zip(setups) {
                containers.configure(id, setup);
            }
        }
        Self {
            containers,
            rtc: p.rtc,
            keypad: p.keypad,
            screen: p.screen,
            alerts: p.alerts,
            actuator: p.actuator,
            consumption: p.consumption,
            safety: SafetyMonitor::new(),
            schedule: ScheduleEngine::new(),
            notifier: p.notifier,
            clock: p.clock,
            timing: p.timing,
            preset_loaded,
            phase: Phase::Idle,
            stats: SessionStats::default(),
            low_stock: [false; CONTAINER_COUNT],
        }
    }

    /// Current phase; `None` before `start`.
    pub fn phase(&self) -> Option<PhaseKind> {
        self.phase.kind()
    }

    pub fn containers(&self) -> &Containers {
        &self.containers
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn safety_active(&self) -> bool {
        self.safety.is_active()
    }

    /// Whether a schedule preset replaced the keypad configure phase.
    pub fn preset_loaded(&self) -> bool {
        self.preset_loaded
    }

    pub fn halt_reason(&self) -> Option<&str> {
        match &self.phase {
            Phase::Halted { reason } => Some(reason),
            _ => None,
        }
    }

    /// Power-up sequence: probe the clock, home doors, splash screens, then
    /// either the clock-entry prompt or the welcome prompt.
    ///
    /// A missing clock halts the controller and returns `CoreError::ClockUnavailable`.
    pub fn start(&mut self) -> Result<()> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(eyre::Report::new(CoreError::State(
                "controller already started".into(),
            )));
        }
        if let Err(e) = self.rtc.probe() {
            let err = map_hw_error(&*e);
            return Err(self.halt(format!("real-time clock did not answer: {err}")));
        }

        if let Err(e) = self.actuator.home_all(&mut self.containers) {
            self.stats.actuator_faults += 1;
            tracing::warn!(error = %e, "door homing incomplete");
        }

        let splash = Duration::from_millis(self.timing.splash_ms);
        self.screen.show("Welcome!", "");
        self.clock.sleep(splash);
        match self.rtc.temperature() {
            Ok(t) => self.screen.show("Room Temp:", &celsius(t)),
            Err(e) => {
                tracing::warn!(error = %map_hw_error(&*e), "temperature read failed");
                self.screen.show("Room Temp:", "--");
            }
        }
        self.clock.sleep(splash);

        let lost_power = match self.rtc.lost_power() {
            Ok(lost) => lost,
            Err(e) => {
                let err = map_hw_error(&*e);
                return Err(self.halt(format!("real-time clock status unreadable: {err}")));
            }
        };
        self.phase = if lost_power {
            tracing::warn!("real-time clock lost power; waiting for time entry");
            self.screen.show(DATE_PROMPT, DATE_FORMAT);
            Phase::SetClock {
                entry: DigitBuffer::new(CLOCK_ENTRY_DIGITS),
            }
        } else {
            self.welcome_prompt();
            Phase::Welcome
        };
        tracing::info!(phase = ?self.phase.kind(), preset = self.preset_loaded, "session started");
        Ok(())
    }

    /// Run one iteration of the control loop and return the phase it left behind.
    pub fn poll(&mut self) -> Result<PhaseKind> {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        let before = phase.kind();
        let next = match phase {
            Phase::Idle => {
                return Err(eyre::Report::new(CoreError::State(
                    "poll called before start".into(),
                )));
            }
            Phase::SetClock { entry } => self.on_set_clock(entry),
            Phase::Welcome => self.on_welcome(),
            Phase::Configure {
                id,
                step,
                entry,
                schedule,
            } => self.on_configure(id, step, entry, schedule),
            Phase::Monitoring => self.on_monitoring(),
            Phase::Dispensing { since, closing } => self.on_dispensing(since, closing),
            halted @ Phase::Halted { .. } => {
                self.clock.sleep(self.key_poll());
                halted
            }
        };
        self.phase = next;
        let after = self.phase.kind().unwrap_or(PhaseKind::Halted);
        if before != Some(after) {
            tracing::info!(from = ?before, to = %after, "phase transition");
        }
        Ok(after)
    }

    // ── Phases ───────────────────────────────────────────────────────────────

    fn on_set_clock(&mut self, entry: DigitBuffer) -> Phase {
        let Some(key) = self.keypad.poll() else {
            self.clock.sleep(self.key_poll());
            return Phase::SetClock { entry };
        };
        let entry = entry.apply(key);
        if entry.as_str().is_empty() {
            self.screen.show(DATE_PROMPT, DATE_FORMAT);
            return Phase::SetClock { entry };
        }
        self.screen.show(DATE_PROMPT, entry.as_str());
        if !entry.is_complete() {
            return Phase::SetClock { entry };
        }

        let Some(at) = parse_clock_entry(entry.as_str()) else {
            tracing::warn!(entry = entry.as_str(), "rejected clock entry");
            self.screen.show("Invalid date", entry.as_str());
            self.hold();
            self.screen.show(DATE_PROMPT, DATE_FORMAT);
            return Phase::SetClock {
                entry: DigitBuffer::new(CLOCK_ENTRY_DIGITS),
            };
        };
        match self.rtc.adjust(at) {
            Ok(()) => {
                tracing::info!(%at, "real-time clock set");
                self.welcome_prompt();
                Phase::Welcome
            }
            Err(e) => {
                tracing::warn!(error = %map_hw_error(&*e), "clock write failed");
                self.screen.show("Clock write", "failed");
                self.hold();
                self.screen.show(DATE_PROMPT, DATE_FORMAT);
                Phase::SetClock {
                    entry: DigitBuffer::new(CLOCK_ENTRY_DIGITS),
                }
            }
        }
    }

    fn on_welcome(&mut self) -> Phase {
        match self.keypad.poll() {
            Some(Key::Digit(d)) => {
                if let Some(id) = ContainerId::from_digit(d) {
                    self.manual_toggle(id);
                }
            }
            Some(Key::Confirm) => {
                if self.containers.any_open() {
                    self.screen.show("All containers", "closed");
                    self.close_doors(|_| true);
                    self.hold();
                }
                self.low_stock = [false; CONTAINER_COUNT];
                return if self.preset_loaded {
                    self.enter_monitoring()
                } else {
                    self.begin_configure(ContainerId::FIRST)
                };
            }
            Some(Key::Clear) => {}
            None => {
                self.sample_consumption(PhaseKind::Welcome);
                self.clock.sleep(self.key_poll());
                return Phase::Welcome;
            }
        }
        self.sample_consumption(PhaseKind::Welcome);
        Phase::Welcome
    }

    fn on_configure(
        &mut self,
        id: ContainerId,
        step: ConfigStep,
        entry: DigitBuffer,
        mut schedule: Schedule,
    ) -> Phase {
        let Some(key) = self.keypad.poll() else {
            self.clock.sleep(self.key_poll());
            return Phase::Configure {
                id,
                step,
                entry,
                schedule,
            };
        };
        let entry = entry.apply(key);
        self.screen.show(&step.prompt(id), entry.as_str());
        let Some(value) = entry.value() else {
            return Phase::Configure {
                id,
                step,
                entry,
                schedule,
            };
        };
        // Every step reads at most two digits.
        let value = value as u8;

        let next = match step {
            ConfigStep::DoseCount if value == 0 => ConfigStep::MaxTemp,
            ConfigStep::DoseCount => ConfigStep::Hour {
                index: 0,
                count: value,
            },
            ConfigStep::Hour { .. } if value > 23 => {
                self.reject("Invalid hour");
                step
            }
            ConfigStep::Hour { index, count } => ConfigStep::Minute {
                index,
                count,
                hour: value,
            },
            ConfigStep::Minute { .. } if value > 59 => {
                self.reject("Invalid minute");
                step
            }
            ConfigStep::Minute { index, count, hour } => {
                if let Some(dose) = DoseTime::new(hour, value)
                    && !schedule.push(dose)
                {
                    tracing::warn!(container = %id, %dose, "schedule full; dose ignored");
                }
                if index + 1 < count {
                    ConfigStep::Hour {
                        index: index + 1,
                        count,
                    }
                } else {
                    ConfigStep::MaxTemp
                }
            }
            ConfigStep::MaxTemp => {
                tracing::info!(
                    container = %id,
                    doses = schedule.len(),
                    max_temp = value,
                    "container configured"
                );
                self.containers.configure(
                    id,
                    ContainerSetup {
                        schedule,
                        max_temperature: value,
                    },
                );
                return match id.next() {
                    Some(next) => self.begin_configure(next),
                    None => {
                        self.screen.show("Setup Complete", "");
                        self.hold();
                        self.enter_monitoring()
                    }
                };
            }
        };
        self.screen.show(&next.prompt(id), "");
        Phase::Configure {
            id,
            step: next,
            entry: DigitBuffer::new(next.digits()),
            schedule,
        }
    }

    fn on_monitoring(&mut self) -> Phase {
        // The front panel is inert while monitoring.
        while let Some(key) = self.keypad.poll() {
            tracing::debug!(?key, "key ignored while monitoring");
        }

        let now = match self.rtc.now() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %map_hw_error(&*e), "clock read failed; skipping tick");
                self.clock.sleep(self.poll_interval());
                return Phase::Monitoring;
            }
        };
        match self.rtc.temperature() {
            Ok(t) => self.check_safety(t),
            Err(e) => tracing::warn!(error = %map_hw_error(&*e), "temperature read failed"),
        }

        let due = self.schedule.due_containers(now, &self.containers);
        if !due.is_empty() {
            return self.begin_dispensing(&due, now);
        }
        self.clock.sleep(self.poll_interval());
        Phase::Monitoring
    }

    fn on_dispensing(&mut self, since: Instant, closing: bool) -> Phase {
        self.record_missed_doses();
        if closing {
            return self.finish_dispensing(since);
        }
        if self.clock.ms_since(since) >= self.timing.dispense_window_ms {
            tracing::info!("dispensing window elapsed; closing doors");
            return self.finish_dispensing(since);
        }
        match self.keypad.poll() {
            Some(Key::Confirm) => {
                if self.ready_door_open() {
                    return self.finish_dispensing(since);
                }
                self.screen.show("Opened", "");
                self.open_ready_doors();
            }
            Some(_) => {}
            None => {
                self.sample_consumption(PhaseKind::Dispensing);
                self.clock.sleep(self.key_poll());
                return Phase::Dispensing {
                    since,
                    closing: false,
                };
            }
        }
        self.sample_consumption(PhaseKind::Dispensing);
        Phase::Dispensing {
            since,
            closing: false,
        }
    }

    /// Doses falling due while doors are already out are not redelivered,
    /// but each one is consumed from the schedule and counted.
    fn record_missed_doses(&mut self) {
        let now = match self.rtc.now() {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(error = %map_hw_error(&*e), "clock read failed while dispensing");
                return;
            }
        };
        for id in self.schedule.due_containers(now, &self.containers) {
            self.schedule.mark_served(id, now);
            self.stats.doses_missed += 1;
            tracing::warn!(container = %id, %now, "dose due while dispensing; not redelivered");
        }
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    fn begin_configure(&mut self, id: ContainerId) -> Phase {
        self.screen.show(&format!("Container {id}"), "");
        self.hold();
        let step = ConfigStep::DoseCount;
        self.screen.show(&step.prompt(id), "");
        Phase::Configure {
            id,
            step,
            entry: DigitBuffer::new(step.digits()),
            schedule: Schedule::new(),
        }
    }

    fn enter_monitoring(&mut self) -> Phase {
        self.alerts.off();
        Phase::Monitoring
    }

    fn begin_dispensing(&mut self, due: &[ContainerId], now: NaiveDateTime) -> Phase {
        for &id in due {
            self.schedule.mark_served(id, now);
            self.containers.get_mut(id).set_ready(true);
        }
        self.stats.doses_triggered += due.len() as u32;
        let numbers: Vec<u8> = due.iter().map(|id| id.number()).collect();
        tracing::info!(containers = ?numbers, %now, "dose due");

        if self.notifier.dose_ready() == Delivery::Fail {
            self.stats.notification_failures += 1;
            self.screen.show("Notify failed", "");
            self.alerts.flash(Color::YELLOW);
        }

        self.screen.show("Your medicine", "is ready!");
        self.open_ready_doors();
        self.alerts.color(Color::GREEN);
        self.alerts.pulse(self.timing.ready_pulses);
        Phase::Dispensing {
            since: self.clock.now(),
            closing: false,
        }
    }

    /// Close every ready door. A door that stays open keeps its ready flag and
    /// the session stays in dispensing, retrying on the next tick.
    fn finish_dispensing(&mut self, since: Instant) -> Phase {
        self.close_doors(|c| c.is_ready());
        for c in self.containers.iter_mut() {
            if !c.door_open() {
                c.set_ready(false);
            }
        }
        if self.ready_door_open() {
            tracing::warn!("ready door still open; retrying close");
            self.screen.show("Close failed", "Retrying");
            self.clock.sleep(self.poll_interval());
            return Phase::Dispensing {
                since,
                closing: true,
            };
        }
        self.screen.show("Doors Closed", "");
        self.low_stock = [false; CONTAINER_COUNT];
        self.alerts.off();
        self.hold();
        self.enter_monitoring()
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn halt(&mut self, reason: String) -> eyre::Report {
        tracing::error!(%reason, "halting; manual reset required");
        self.screen.show("Couldn't find", "RTC");
        self.alerts.color(Color::RED);
        self.phase = Phase::Halted {
            reason: reason.clone(),
        };
        eyre::Report::new(CoreError::ClockUnavailable(reason))
    }

    fn manual_toggle(&mut self, id: ContainerId) {
        let (target, label) = if self.containers[id].door_open() {
            (DoorTarget::Closed, "Closed")
        } else {
            (DoorTarget::Open, "Opened")
        };
        self.screen.show(&format!("Container {id}"), label);
        if self.move_door(id, target) {
            match target {
                DoorTarget::Open => {
                    self.consumption.reseed(self.containers.get_mut(id));
                }
                DoorTarget::Closed => self.low_stock[id.index()] = false,
            }
        }
        self.hold();
        self.welcome_prompt();
    }

    /// Returns whether the door reached its target.
    fn move_door(&mut self, id: ContainerId, target: DoorTarget) -> bool {
        match self
            .actuator
            .set_door(self.containers.get_mut(id), target)
        {
            Ok(()) => true,
            Err(e) => {
                self.stats.actuator_faults += 1;
                tracing::warn!(container = %id, ?target, error = %e, "door motion failed");
                self.screen.show(&format!("Door {id} fault"), "Check container");
                self.alerts.color(Color::YELLOW);
                self.alerts.pulse(1);
                false
            }
        }
    }

    fn close_doors(&mut self, filter: impl Fn(&crate::container::Container) -> bool) {
        let ids: Vec<ContainerId> = self
            .containers
            .iter()
            .filter(|c| c.door_open() && filter(c))
            .map(|c| c.id())
            .collect();
        for id in ids {
            self.move_door(id, DoorTarget::Closed);
        }
    }

    /// Open every ready door that is closed, reseeding its baseline.
    fn open_ready_doors(&mut self) {
        let ids: Vec<ContainerId> = self
            .containers
            .iter()
            .filter(|c| c.is_ready() && !c.door_open())
            .map(|c| c.id())
            .collect();
        for id in ids {
            if self.move_door(id, DoorTarget::Open) {
                self.consumption.reseed(self.containers.get_mut(id));
            }
        }
    }

    fn ready_door_open(&self) -> bool {
        self.containers
            .iter()
            .any(|c| c.is_ready() && c.door_open())
    }

    fn check_safety(&mut self, ambient_c: f32) {
        let was_active = self.safety.is_active();
        match self.safety.check(ambient_c, &self.containers) {
            SafetyStatus::Alert => {
                if !was_active {
                    self.stats.safety_alerts += 1;
                }
                self.screen.show("High Temperature", &celsius(ambient_c));
                self.alerts.color(Color::RED);
                self.alerts.pulse(1);
            }
            SafetyStatus::Clear => {
                self.screen.show("Room Temp:", &celsius(ambient_c));
                self.alerts.off();
            }
        }
    }

    /// Classify every open sensor-bearing container and raise the matching alert.
    /// Low stock is announced once per episode.
    fn sample_consumption(&mut self, kind: PhaseKind) {
        for id in ContainerId::all() {
            let Some(verdict) = self.consumption.classify(self.containers.get_mut(id)) else {
                continue;
            };
            let was_low = std::mem::replace(
                &mut self.low_stock[id.index()],
                verdict == Consumption::LowStock,
            );
            match verdict {
                Consumption::LowStock if !was_low => {
                    self.stats.low_stock_alerts += 1;
                    self.screen
                        .show(&format!("Container {id} has"), "less medicine");
                    self.alerts.flash(Color::BLUE);
                }
                Consumption::LowStock => {}
                Consumption::Consumed => {
                    self.stats.doses_taken += 1;
                    tracing::info!(container = %id, "medicine taken");
                    self.screen.show(&format!("Medicine {id}"), "taken");
                    self.alerts.color(Color::MAGENTA);
                    self.clock.sleep(self.hold_duration() * 2);
                    self.alerts.off();
                    self.idle_screen(kind);
                }
                Consumption::NoChange if was_low => {
                    self.alerts.off();
                    self.idle_screen(kind);
                }
                Consumption::NoChange => {}
            }
        }
    }

    fn idle_screen(&mut self, kind: PhaseKind) {
        match kind {
            PhaseKind::Welcome => self.welcome_prompt(),
            PhaseKind::Dispensing => self.screen.show("Your medicine", "is ready!"),
            _ => {}
        }
    }

    fn welcome_prompt(&mut self) {
        self.screen.show("1-5 open/close", "A to proceed");
    }

    fn reject(&mut self, message: &str) {
        tracing::debug!(message, "entry rejected");
        self.screen.show(message, "");
        self.hold();
    }

    fn hold(&self) {
        self.clock.sleep(self.hold_duration());
    }

    fn hold_duration(&self) -> Duration {
        Duration::from_millis(self.timing.message_hold_ms)
    }

    fn key_poll(&self) -> Duration {
        Duration::from_millis(self.timing.key_poll_ms)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.timing.poll_interval_ms)
    }
}

//! Shared simulated rig for controller tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use pillbox_core::{
    ContainerId, ContainerSetup, DoorGeometry, DoseTime, PhaseKind, Schedule, SessionController,
};
use pillbox_hardware::{
    DisplayProbe, IndicatorProbe, KeyQueue, LogNotifier, OutboxProbe, RtcProbe, ScriptedKeypad,
    ServoProbe, SimulatedDisplay, SimulatedIndicator, SimulatedLoadCell, SimulatedRtc,
    SimulatedServo, WeightProbe,
};
use pillbox_traits::{ManualClock, Servo};

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 14)
        .and_then(|d| d.and_hms_opt(h, m, s))
        .unwrap()
}

/// All five containers share `ceiling`; only `id` gets doses.
pub fn preset_for(id: ContainerId, doses: &[(u8, u8)], ceiling: u8) -> Vec<ContainerSetup> {
    ContainerId::all()
        .map(|c| {
            let mut schedule = Schedule::new();
            if c == id {
                for &(h, m) in doses {
                    assert!(schedule.push(DoseTime::new(h, m).unwrap()));
                }
            }
            ContainerSetup {
                schedule,
                max_temperature: ceiling,
            }
        })
        .collect()
}

pub struct RigOpts {
    pub start: NaiveDateTime,
    pub ambient: f32,
    pub grams: f32,
    pub lost_power: bool,
    pub absent: bool,
    pub preset: Option<Vec<ContainerSetup>>,
}

impl Default for RigOpts {
    fn default() -> Self {
        Self {
            start: at(7, 58, 0),
            ambient: 22.0,
            grams: 50.0,
            lost_power: false,
            absent: false,
            preset: None,
        }
    }
}

pub struct Rig {
    pub ctl: SessionController,
    pub clock: ManualClock,
    pub start: NaiveDateTime,
    pub keys: KeyQueue,
    pub display: DisplayProbe,
    pub indicator: IndicatorProbe,
    pub outbox: OutboxProbe,
    pub rtc: RtcProbe,
    pub servos: Vec<ServoProbe>,
    /// Load cells on containers 2..=4, indexed by container index.
    pub weights: Vec<Option<WeightProbe>>,
}

impl Rig {
    pub fn new(opts: RigOpts) -> Self {
        let clock = ManualClock::new();
        let shared: Arc<dyn pillbox_traits::Clock + Send + Sync> = Arc::new(clock.clone());

        let mut rtc = SimulatedRtc::new(shared.clone(), opts.start, opts.ambient);
        if opts.lost_power {
            rtc = rtc.with_lost_power();
        }
        if opts.absent {
            rtc = rtc.absent();
        }
        let rtc_probe = rtc.probe();

        let keypad = ScriptedKeypad::new();
        let keys = keypad.queue();
        let display = SimulatedDisplay::new();
        let display_probe = display.probe();
        let indicator = SimulatedIndicator::new();
        let indicator_probe = indicator.probe();
        let notifier = LogNotifier::new();
        let outbox = notifier.probe();

        let mut servo_probes = Vec::new();
        let servos: Vec<Box<dyn Servo>> = DoorGeometry::factory()
            .iter()
            .map(|g| {
                let s = SimulatedServo::new(g.close_angle);
                servo_probes.push(s.probe());
                Box::new(s) as Box<dyn Servo>
            })
            .collect();

        let mut builder = SessionController::builder()
            .with_rtc(rtc)
            .with_keypad(keypad)
            .with_servos(servos)
            .with_display(display)
            .with_indicator(indicator)
            .with_notifier(notifier)
            .with_clock(shared);
        let mut weights = vec![None; 5];
        for idx in 1..=3 {
            let cell = SimulatedLoadCell::new(opts.grams);
            weights[idx] = Some(cell.probe());
            builder = builder.with_load_cell(ContainerId::new(idx).unwrap(), cell);
        }
        if let Some(p) = opts.preset {
            builder = builder.with_preset(p);
        }

        Self {
            ctl: builder.build().unwrap(),
            clock,
            start: opts.start,
            keys,
            display: display_probe,
            indicator: indicator_probe,
            outbox,
            rtc: rtc_probe,
            servos: servo_probes,
            weights,
        }
    }

    /// Wall time as the simulated clock reports it (no adjust).
    pub fn wall(&self) -> NaiveDateTime {
        self.start + chrono::Duration::from_std(self.clock.elapsed()).unwrap()
    }

    pub fn phase(&self) -> PhaseKind {
        self.ctl.phase().unwrap()
    }

    /// Poll until `pred` holds, at most `max` times. Returns whether it held.
    pub fn pump(&mut self, max: usize, pred: impl Fn(&SessionController) -> bool) -> bool {
        for _ in 0..max {
            if pred(&self.ctl) {
                return true;
            }
            self.ctl.poll().unwrap();
        }
        pred(&self.ctl)
    }

    pub fn pump_until_wall(&mut self, until: NaiveDateTime) {
        while self.wall() < until {
            self.ctl.poll().unwrap();
        }
    }

    /// Started rig with a preset, advanced into monitoring.
    pub fn monitoring(opts: RigOpts) -> Self {
        let mut rig = Self::new(opts);
        rig.ctl.start().unwrap();
        rig.keys.push_script("A");
        assert!(rig.pump(5, |c| c.phase() == Some(PhaseKind::Monitoring)));
        rig
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }
}

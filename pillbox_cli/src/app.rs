//! Session assembly: config mapping, peripheral wiring, and the run loop.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::NaiveDateTime;
use eyre::WrapErr;
use pillbox_config::{Config, ContainerPreset};
use pillbox_core::error::{CoreError, Result};
use pillbox_core::runner::{self, RunSummary, StopReason};
use pillbox_core::{ContainerId, ContainerSetup, SessionController, SessionStats};
use pillbox_hardware::{LogNotifier, SimulatedDisplay, SimulatedIndicator, SimulatedRtc};
use pillbox_traits::{Clock, ManualClock, MonotonicClock, Servo};
use serde_json::json;

use crate::cli::RunArgs;
use crate::keypad::ChannelKeypad;

/// Simulated minutes a `--virtual-time` run lasts without `--run-for-mins`.
const VIRTUAL_DAY_MINS: u64 = 24 * 60;

const START_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Read, parse, and validate a config file.
///
/// A missing file at the default path yields the built-in defaults.
pub fn load_config(path: &Path, is_default_path: bool) -> Result<Config> {
    if is_default_path && !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using built-in defaults");
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    let cfg = pillbox_config::load_toml(&text)
        .map_err(|e| CoreError::Config(format!("parse {}: {e}", path.display())))?;
    cfg.validate()
        .map_err(|e| CoreError::Config(e.to_string()))?;
    Ok(cfg)
}

pub fn load_schedule(path: &Path) -> Result<Vec<ContainerPreset>> {
    pillbox_config::load_schedule_csv(path).map_err(|e| {
        eyre::Report::new(CoreError::Config(format!(
            "schedule {}: {e}",
            path.display()
        )))
    })
}

fn parse_start(s: Option<&str>) -> Result<NaiveDateTime> {
    match s {
        Some(s) => NaiveDateTime::parse_from_str(s.trim(), START_FORMAT).map_err(|e| {
            eyre::Report::new(CoreError::Config(format!(
                "--start {s:?} is not \"YYYY-MM-DD HH:MM:SS\": {e}"
            )))
        }),
        None => Ok(chrono::Local::now().naive_local()),
    }
}

/// Build a controller for `cfg` on the simulated (or, with the `hardware`
/// feature, GPIO-backed) peripherals.
pub fn assemble(
    cfg: &Config,
    preset: Option<&[ContainerPreset]>,
    args: &RunArgs,
    clock: Arc<dyn Clock + Send + Sync>,
    echo: bool,
) -> Result<SessionController> {
    let start = parse_start(args.start.as_deref())?;
    let mut rtc = SimulatedRtc::new(clock.clone(), start, args.ambient);
    if args.lost_power {
        rtc = rtc.with_lost_power();
    }
    if args.no_rtc {
        rtc = rtc.absent();
    }

    let keypad = match &args.keys {
        Some(path) => {
            let script = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read key script {}", path.display()))?;
            ChannelKeypad::from_script(&script)
        }
        None if args.virtual_time => ChannelKeypad::from_script(""),
        None => ChannelKeypad::spawn_stdin(),
    };

    let mut builder = SessionController::builder()
        .with_config(cfg)
        .with_clock(clock)
        .with_display(SimulatedDisplay::new().echo(echo))
        .with_indicator(SimulatedIndicator::new())
        .with_notifier(LogNotifier::new());

    if let Some(preset) = preset {
        builder = builder.with_preset(preset.iter().map(ContainerSetup::from).collect());
    }

    for (idx, c) in cfg.containers.iter().enumerate() {
        let Some(lc) = &c.load_cell else { continue };
        let id = ContainerId::new(idx)
            .ok_or_else(|| CoreError::Config(format!("container index {idx} out of range")))?;
        #[cfg(feature = "hardware")]
        {
            let timeout = Duration::from_millis(cfg.hardware.sensor_read_timeout_ms);
            let cell =
                pillbox_hardware::HardwareLoadCell::new(lc.dt, lc.sck, lc.cal_factor, timeout)
                    .wrap_err_with(|| format!("open load cell for container {}", id.number()))?;
            builder = builder.with_load_cell(id, cell);
        }
        #[cfg(not(feature = "hardware"))]
        {
            tracing::debug!(container = id.number(), dt = lc.dt, sck = lc.sck, "simulated load cell");
            builder = builder.with_load_cell(
                id,
                pillbox_hardware::SimulatedLoadCell::new(args.stock_g),
            );
        }
    }

    let servos = make_servos(cfg)?;
    builder
        .with_rtc(rtc)
        .with_keypad(keypad)
        .with_servos(servos)
        .build()
}

#[cfg(not(feature = "hardware"))]
fn make_servos(cfg: &Config) -> Result<Vec<Box<dyn Servo>>> {
    Ok(cfg
        .containers
        .iter()
        .map(|c| Box::new(pillbox_hardware::SimulatedServo::new(c.close_angle)) as Box<dyn Servo>)
        .collect())
}

#[cfg(feature = "hardware")]
fn make_servos(cfg: &Config) -> Result<Vec<Box<dyn Servo>>> {
    let pins = cfg
        .pins
        .as_ref()
        .ok_or_else(|| CoreError::Config("pins.servos is required for the hardware backend".into()))?;
    let mut servos: Vec<Box<dyn Servo>> = Vec::with_capacity(pins.servos.len());
    for (pin, c) in pins.servos.iter().zip(&cfg.containers) {
        let servo = pillbox_hardware::PwmServo::new(*pin, c.close_angle)
            .wrap_err_with(|| format!("open servo pin {pin}"))?;
        servos.push(Box::new(servo));
    }
    Ok(servos)
}

/// Assemble and run a session until it halts, is interrupted, or the run limit passes.
pub fn run_session(
    cfg: &Config,
    args: &RunArgs,
    shutdown: &AtomicBool,
    echo: bool,
) -> Result<RunSummary> {
    let preset = args.schedule.as_deref().map(load_schedule).transpose()?;

    let clock: Arc<dyn Clock + Send + Sync> = if args.virtual_time {
        Arc::new(ManualClock::new())
    } else {
        Arc::new(MonotonicClock::new())
    };
    let limit_mins = match (args.run_for_mins, args.virtual_time) {
        (Some(m), _) => Some(m),
        (None, true) => Some(VIRTUAL_DAY_MINS),
        (None, false) => None,
    };

    let mut controller = assemble(cfg, preset.as_deref(), args, clock.clone(), echo)?;
    tracing::info!(
        virtual_time = args.virtual_time,
        limit_mins,
        preset = preset.is_some(),
        "session start"
    );
    let summary = runner::run(
        &mut controller,
        clock,
        shutdown,
        limit_mins.map(|m| Duration::from_secs(m * 60)),
    )?;
    tracing::info!(
        reason = stop_reason_name(summary.reason),
        phase = %summary.final_phase,
        polls = summary.polls,
        "session end"
    );
    Ok(summary)
}

pub fn stop_reason_name(r: StopReason) -> &'static str {
    match r {
        StopReason::Halted => "halted",
        StopReason::Shutdown => "shutdown",
        StopReason::RunLimit => "run_limit",
    }
}

fn stats_json(s: &SessionStats) -> serde_json::Value {
    json!({
        "doses_triggered": s.doses_triggered,
        "doses_taken": s.doses_taken,
        "doses_missed": s.doses_missed,
        "low_stock_alerts": s.low_stock_alerts,
        "safety_alerts": s.safety_alerts,
        "notification_failures": s.notification_failures,
        "actuator_faults": s.actuator_faults,
    })
}

pub fn summary_json(s: &RunSummary) -> String {
    json!({
        "reason": stop_reason_name(s.reason),
        "final_phase": s.final_phase.to_string(),
        "polls": s.polls,
        "elapsed_ms": s.elapsed_ms,
        "stats": stats_json(&s.stats),
    })
    .to_string()
}

pub fn print_summary(s: &RunSummary) {
    let st = &s.stats;
    println!(
        "Session ended ({}) in phase {} after {} polls, {:.1} min",
        stop_reason_name(s.reason),
        s.final_phase,
        s.polls,
        s.elapsed_ms as f64 / 60_000.0
    );
    println!(
        "Doses triggered: {}, taken: {}, missed: {}",
        st.doses_triggered, st.doses_taken, st.doses_missed
    );
    println!(
        "Alerts: low stock {}, temperature {}",
        st.low_stock_alerts, st.safety_alerts
    );
    println!(
        "Faults: notifications {}, actuators {}",
        st.notification_failures, st.actuator_faults
    );
}

/// Count of containers with a load cell fitted.
pub fn sensor_count(cfg: &Config) -> usize {
    cfg.containers
        .iter()
        .filter(|c| c.load_cell.is_some())
        .count()
}

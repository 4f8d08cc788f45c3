//! `From` implementations bridging `pillbox_config` types to `pillbox_core` types.

use crate::config::{ConsumptionCfg, DoorGeometry, NotifyCfg, Timeouts, TimingCfg};
use crate::container::ContainerSetup;
use crate::schedule::{DoseTime, Schedule};

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&pillbox_config::Timing> for TimingCfg {
    fn from(c: &pillbox_config::Timing) -> Self {
        Self {
            poll_interval_ms: c.poll_interval_ms,
            dispense_window_ms: c.dispense_window_ms,
            servo_step_ms: c.servo_step_ms,
            key_poll_ms: c.key_poll_ms,
            message_hold_ms: c.message_hold_ms,
            pulse_ms: c.pulse_ms,
            ready_pulses: c.ready_pulses,
            splash_ms: c.splash_ms,
        }
    }
}

// ── ConsumptionCfg ───────────────────────────────────────────────────────────

impl From<&pillbox_config::Consumption> for ConsumptionCfg {
    fn from(c: &pillbox_config::Consumption) -> Self {
        Self {
            low_stock_floor: c.low_stock_floor,
            consumed_delta: c.consumed_delta,
        }
    }
}

// ── DoorGeometry ─────────────────────────────────────────────────────────────

impl From<&pillbox_config::ContainerCfg> for DoorGeometry {
    fn from(c: &pillbox_config::ContainerCfg) -> Self {
        Self {
            open_angle: c.open_angle,
            close_angle: c.close_angle,
        }
    }
}

// ── NotifyCfg ────────────────────────────────────────────────────────────────

impl From<&pillbox_config::NotifierCfg> for NotifyCfg {
    fn from(c: &pillbox_config::NotifierCfg) -> Self {
        Self {
            recipient: c.recipient.clone(),
            message: c.message.clone(),
        }
    }
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

impl From<&pillbox_config::Hardware> for Timeouts {
    fn from(c: &pillbox_config::Hardware) -> Self {
        Self {
            sensor_ms: c.sensor_read_timeout_ms,
        }
    }
}

// ── Schedule preset ──────────────────────────────────────────────────────────

/// Out-of-range times and doses past capacity are dropped; the CSV loader
/// already rejects both, so this only matters for hand-built presets.
impl From<&pillbox_config::ContainerPreset> for ContainerSetup {
    fn from(p: &pillbox_config::ContainerPreset) -> Self {
        let mut schedule = Schedule::new();
        for &(h, m) in &p.doses {
            if let Some(dose) = DoseTime::new(h, m) {
                let _ = schedule.push(dose);
            }
        }
        Self {
            schedule,
            max_temperature: p.max_temp,
        }
    }
}

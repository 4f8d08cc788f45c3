//! Runtime configuration structs used by the session controller.
//!
//! They are separate from the TOML-deserialized config in `pillbox_config`;
//! see `conversions` for the mapping.

/// Blocking waits the control loop performs, all in milliseconds.
#[derive(Debug, Clone)]
pub struct TimingCfg {
    /// Monitoring cadence.
    pub poll_interval_ms: u64,
    /// Dispensing window before doors auto-close.
    pub dispense_window_ms: u64,
    /// Delay between one-degree actuator steps.
    pub servo_step_ms: u64,
    /// Idle wait when no key is pending.
    pub key_poll_ms: u64,
    /// Hold time for transient status messages.
    pub message_hold_ms: u64,
    /// Buzzer on/off half-period.
    pub pulse_ms: u64,
    /// Buzzer pulses when a dose becomes due.
    pub ready_pulses: u32,
    /// Welcome and room-temperature splash duration.
    pub splash_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            poll_interval_ms: 30_000,
            dispense_window_ms: 30 * 60 * 1000,
            servo_step_ms: 15,
            key_poll_ms: 50,
            message_hold_ms: 1000,
            pulse_ms: 500,
            ready_pulses: 10,
            splash_ms: 4000,
        }
    }
}

/// Weight thresholds for the consumption classifier (sensor units).
#[derive(Debug, Clone, Copy)]
pub struct ConsumptionCfg {
    /// Any reading below this is low stock.
    pub low_stock_floor: f32,
    /// A change strictly larger than this during a dose window counts as taken.
    pub consumed_delta: f32,
}

impl Default for ConsumptionCfg {
    fn default() -> Self {
        Self {
            low_stock_floor: 5.0,
            consumed_delta: 2.0,
        }
    }
}

/// Open and closed servo angles of one door. Not symmetric across containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorGeometry {
    pub open_angle: u8,
    pub close_angle: u8,
}

impl DoorGeometry {
    /// Factory geometry for the five doors, in container order.
    pub fn factory() -> [DoorGeometry; crate::CONTAINER_COUNT] {
        [(0, 100), (180, 80), (160, 60), (0, 90), (90, 0)].map(|(open_angle, close_angle)| {
            DoorGeometry {
                open_angle,
                close_angle,
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct NotifyCfg {
    pub recipient: String,
    pub message: String,
}

impl Default for NotifyCfg {
    fn default() -> Self {
        Self {
            recipient: "+15550100".to_string(),
            message: "Your medicine is ready now!".to_string(),
        }
    }
}

/// Timeouts and watchdogs.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Max load cell wait per read (ms).
    pub sensor_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { sensor_ms: 150 }
    }
}

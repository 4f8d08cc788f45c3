#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and schedule preset parsing for the dispenser.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - The schedule preset CSV loader enforces headers and per-container
//!   consistency so a whole setup can be replayed without the keypad.
use serde::Deserialize;
use std::collections::BTreeMap;

/// Number of containers the appliance carries.
pub const CONTAINER_COUNT: usize = 5;
/// Dose entries a single container can hold.
pub const MAX_DOSES: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Monitoring cadence (ms).
    pub poll_interval_ms: u64,
    /// Length of a dispensing window before doors auto-close (ms).
    pub dispense_window_ms: u64,
    /// Delay between one-degree servo steps (ms).
    pub servo_step_ms: u64,
    /// Idle wait between key polls (ms).
    pub key_poll_ms: u64,
    /// How long transient status messages stay visible (ms).
    pub message_hold_ms: u64,
    /// Buzzer on/off half-period (ms).
    pub pulse_ms: u64,
    /// Buzzer pulses when a dose becomes due.
    pub ready_pulses: u32,
    /// Welcome and room-temperature splash duration (ms).
    pub splash_ms: u64,
}

impl Default for Timing {
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Consumption {
    /// Readings below this are low stock, whatever the baseline.
    pub low_stock_floor: f32,
    /// Minimum |weight - baseline| that counts as medicine taken.
    pub consumed_delta: f32,
}

impl Default for Consumption {
    fn default() -> Self {
        Self {
            low_stock_floor: 5.0,
            consumed_delta: 2.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NotifierCfg {
    pub recipient: String,
    pub message: String,
}

impl Default for NotifierCfg {
    fn default() -> Self {
        Self {
            recipient: "+15550100".to_string(),
            message: "Your medicine is ready now!".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Max time to wait for a load cell sample before treating it as stale
    pub sensor_read_timeout_ms: u64,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            sensor_read_timeout_ms: 150,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct LoadCellCfg {
    pub dt: u8,
    pub sck: u8,
    /// Raw counts per sensor unit
    #[serde(default = "default_cal_factor")]
    pub cal_factor: f32,
}

fn default_cal_factor() -> f32 {
    1000.0
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ContainerCfg {
    pub open_angle: u8,
    pub close_angle: u8,
    /// Present only on sensor-bearing containers
    #[serde(default)]
    pub load_cell: Option<LoadCellCfg>,
}

impl ContainerCfg {
    /// Factory door geometry and sensor layout of the five-container unit.
    pub fn factory() -> Vec<ContainerCfg> {
        const OPEN: [u8; CONTAINER_COUNT] = [0, 180, 160, 0, 90];
        const CLOSE: [u8; CONTAINER_COUNT] = [100, 80, 60, 90, 0];
        const CELLS: [Option<(u8, u8, f32)>; CONTAINER_COUNT] = [
            None,
            Some((43, 41, 1020.0)),
            Some((39, 37, 1090.0)),
            Some((35, 33, -920.0)),
            None,
        ];
        (0..CONTAINER_COUNT)
            .map(|i| ContainerCfg {
                open_angle: OPEN[i],
                close_angle: CLOSE[i],
                load_cell: CELLS[i].map(|(dt, sck, cal_factor)| LoadCellCfg {
                    dt,
                    sck,
                    cal_factor,
                }),
            })
            .collect()
    }
}

fn default_containers() -> Vec<ContainerCfg> {
    ContainerCfg::factory()
}

#[derive(Debug, Deserialize, Default)]
pub struct Pins {
    /// Servo GPIO per container, in container order
    #[serde(default)]
    pub servos: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub consumption: Consumption,
    #[serde(default)]
    pub notifier: NotifierCfg,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default = "default_containers")]
    pub containers: Vec<ContainerCfg>,
    /// GPIO assignments; only consulted by hardware builds
    #[serde(default)]
    pub pins: Option<Pins>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            consumption: Consumption::default(),
            notifier: NotifierCfg::default(),
            hardware: Hardware::default(),
            logging: Logging::default(),
            containers: default_containers(),
            pins: None,
        }
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Timing
        let t = &self.timing;
        if t.poll_interval_ms == 0 {
            eyre::bail!("timing.poll_interval_ms must be >= 1");
        }
        if t.dispense_window_ms == 0 {
            eyre::bail!("timing.dispense_window_ms must be >= 1");
        }
        if t.dispense_window_ms > 24 * 60 * 60 * 1000 {
            eyre::bail!("timing.dispense_window_ms is unreasonably large (>24h)");
        }
        if t.servo_step_ms == 0 {
            eyre::bail!("timing.servo_step_ms must be >= 1");
        }
        if t.key_poll_ms == 0 {
            eyre::bail!("timing.key_poll_ms must be >= 1");
        }
        if t.pulse_ms == 0 {
            eyre::bail!("timing.pulse_ms must be >= 1");
        }

        // Consumption
        let c = &self.consumption;
        if !c.low_stock_floor.is_finite() || c.low_stock_floor < 0.0 {
            eyre::bail!("consumption.low_stock_floor must be >= 0.0");
        }
        if !c.consumed_delta.is_finite() || c.consumed_delta <= 0.0 {
            eyre::bail!("consumption.consumed_delta must be > 0.0");
        }

        // Notifier
        if self.notifier.recipient.trim().is_empty() {
            eyre::bail!("notifier.recipient must not be empty");
        }

        // Hardware
        if self.hardware.sensor_read_timeout_ms == 0 {
            eyre::bail!("hardware.sensor_read_timeout_ms must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        // Containers
        if self.containers.len() != CONTAINER_COUNT {
            eyre::bail!(
                "containers must list exactly {CONTAINER_COUNT} entries, got {}",
                self.containers.len()
            );
        }
        for (i, cc) in self.containers.iter().enumerate() {
            let n = i + 1;
            if cc.open_angle > 180 || cc.close_angle > 180 {
                eyre::bail!("containers[{n}] angles must be within 0..=180");
            }
            if cc.open_angle == cc.close_angle {
                eyre::bail!("containers[{n}] open_angle and close_angle must differ");
            }
            if let Some(lc) = cc.load_cell
                && (!lc.cal_factor.is_finite() || lc.cal_factor == 0.0)
            {
                eyre::bail!("containers[{n}].load_cell.cal_factor must be non-zero");
            }
        }

        // Pins
        if let Some(pins) = &self.pins
            && !pins.servos.is_empty()
            && pins.servos.len() != CONTAINER_COUNT
        {
            eyre::bail!(
                "pins.servos must list {CONTAINER_COUNT} GPIOs, got {}",
                pins.servos.len()
            );
        }

        Ok(())
    }
}

// ── Schedule preset (CSV) ────────────────────────────────────────────────────

/// Schedule preset CSV schema.
///
/// Expected headers:
/// container,hour,minute,max_temp
///
/// Example:
/// container,hour,minute,max_temp
/// 1,08,00,30
/// 1,20,00,30
/// 2,,,28
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ScheduleRow {
    pub container: u8,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub max_temp: u8,
}

/// One container's preset: ordered (hour, minute) doses plus its ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerPreset {
    pub doses: Vec<(u8, u8)>,
    pub max_temp: u8,
}

impl ContainerPreset {
    /// Group rows by container, checking ranges, capacity, and ceiling consistency.
    pub fn from_rows(rows: &[ScheduleRow]) -> eyre::Result<Vec<ContainerPreset>> {
        let mut by_container: BTreeMap<u8, ContainerPreset> = BTreeMap::new();
        for (idx, row) in rows.iter().enumerate() {
            let line = idx + 2;
            if !(1..=CONTAINER_COUNT as u8).contains(&row.container) {
                eyre::bail!(
                    "row {line}: container must be 1..={CONTAINER_COUNT}, got {}",
                    row.container
                );
            }
            if row.max_temp > 99 {
                eyre::bail!("row {line}: max_temp must be two digits, got {}", row.max_temp);
            }
            let entry = by_container
                .entry(row.container)
                .or_insert_with(|| ContainerPreset {
                    doses: Vec::new(),
                    max_temp: row.max_temp,
                });
            if entry.max_temp != row.max_temp {
                eyre::bail!(
                    "row {line}: container {} has conflicting max_temp {} vs {}",
                    row.container,
                    entry.max_temp,
                    row.max_temp
                );
            }
            match (row.hour, row.minute) {
                (None, None) => {}
                (Some(h), Some(m)) => {
                    if h > 23 || m > 59 {
                        eyre::bail!("row {line}: time {h:02}:{m:02} is out of range");
                    }
                    if entry.doses.len() >= MAX_DOSES {
                        eyre::bail!(
                            "row {line}: container {} exceeds {MAX_DOSES} doses",
                            row.container
                        );
                    }
                    entry.doses.push((h, m));
                }
                _ => eyre::bail!("row {line}: hour and minute must both be set or both empty"),
            }
        }

        let mut out = Vec::with_capacity(CONTAINER_COUNT);
        for n in 1..=CONTAINER_COUNT as u8 {
            match by_container.remove(&n) {
                Some(p) => out.push(p),
                None => eyre::bail!("schedule preset is missing container {n}"),
            }
        }
        Ok(out)
    }
}

pub fn load_schedule_csv(path: &std::path::Path) -> eyre::Result<Vec<ContainerPreset>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open schedule CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["container", "hour", "minute", "max_temp"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "schedule CSV must have headers 'container,hour,minute,max_temp', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<ScheduleRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    ContainerPreset::from_rows(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_factory_layout() {
        let cfg = load_toml("").expect("parse empty");
        cfg.validate().expect("defaults are valid");
        assert_eq!(cfg.containers.len(), CONTAINER_COUNT);
        let sensors: Vec<bool> = cfg.containers.iter().map(|c| c.load_cell.is_some()).collect();
        assert_eq!(sensors, [false, true, true, true, false]);
        assert_eq!(cfg.timing.dispense_window_ms, 1_800_000);
    }

    #[test]
    fn preset_rows_group_by_container() {
        let mut rows = vec![
            ScheduleRow { container: 1, hour: Some(8), minute: Some(0), max_temp: 30 },
            ScheduleRow { container: 1, hour: Some(20), minute: Some(0), max_temp: 30 },
        ];
        for n in 2..=5 {
            rows.push(ScheduleRow { container: n, hour: None, minute: None, max_temp: 30 });
        }
        let presets = ContainerPreset::from_rows(&rows).expect("valid rows");
        assert_eq!(presets[0].doses, vec![(8, 0), (20, 0)]);
        assert!(presets[4].doses.is_empty());
    }
}

//! Weight-based consumption detection for sensor-bearing containers.

use std::time::Duration;

use pillbox_traits::LoadCell;

use crate::CONTAINER_COUNT;
use crate::config::{ConsumptionCfg, Timeouts};
use crate::container::{Container, ContainerId};
use crate::hw_error::map_hw_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// Reading under the absolute floor. Baseline untouched.
    LowStock,
    /// Weight moved past the delta during a dose window. Baseline updated.
    Consumed,
    NoChange,
}

/// Classify one reading. The low-stock floor wins over everything else; a
/// consumption delta only counts while the container is `ready`.
pub fn classify_reading(
    weight: f32,
    baseline: f32,
    ready: bool,
    cfg: &ConsumptionCfg,
) -> Consumption {
    if weight < cfg.low_stock_floor {
        Consumption::LowStock
    } else if ready && (weight - baseline).abs() > cfg.consumed_delta {
        Consumption::Consumed
    } else {
        Consumption::NoChange
    }
}

/// Owns the load cells and applies `classify_reading` to open doors.
pub struct ConsumptionMonitor {
    cells: Vec<Option<Box<dyn LoadCell>>>,
    cfg: ConsumptionCfg,
    timeout: Duration,
}

impl ConsumptionMonitor {
    /// `cells[i]` is the load cell under container `i`, if fitted.
    pub fn new(
        mut cells: Vec<Option<Box<dyn LoadCell>>>,
        cfg: ConsumptionCfg,
        timeouts: &Timeouts,
    ) -> Self {
        cells.resize_with(CONTAINER_COUNT, || None);
        Self {
            cells,
            cfg,
            timeout: Duration::from_millis(timeouts.sensor_ms),
        }
    }

    /// Which containers carry a sensor, for building `Containers`.
    pub fn sensor_map(&self) -> [bool; CONTAINER_COUNT] {
        let mut out = [false; CONTAINER_COUNT];
        for (slot, cell) in out.iter_mut().zip(&self.cells) {
            *slot = cell.is_some();
        }
        out
    }

    /// Fresh reading or `None` when the cell is absent, not ready, or erroring.
    fn read(&mut self, id: ContainerId) -> Option<f32> {
        let cell = self.cells.get_mut(id.index())?.as_mut()?;
        match cell.read(self.timeout) {
            Ok(Some(w)) if w.is_finite() => Some(w),
            Ok(_) => {
                tracing::trace!(container = %id, "no fresh sample; skipping");
                None
            }
            Err(e) => {
                let err = map_hw_error(&*e);
                tracing::warn!(container = %id, error = %err, "load cell read failed; skipping");
                None
            }
        }
    }

    /// Sample and classify an open, sensor-bearing container.
    ///
    /// Returns `None` when the container is skipped this tick: no sensor, door
    /// closed, or no usable reading. A `Consumed` result moves the baseline.
    pub fn classify(&mut self, container: &mut Container) -> Option<Consumption> {
        if !container.sensor_present() || !container.door_open() {
            return None;
        }
        let id = container.id();
        let weight = self.read(id)?;
        let baseline = container.baseline_weight()?;
        let verdict = classify_reading(weight, baseline, container.is_ready(), &self.cfg);
        match verdict {
            Consumption::LowStock => {
                tracing::warn!(container = %id, weight, "low stock");
            }
            Consumption::Consumed => {
                tracing::debug!(container = %id, weight, baseline, "consumption detected");
                container.set_baseline(weight);
            }
            Consumption::NoChange => {
                tracing::trace!(container = %id, weight, "no change");
            }
        }
        Some(verdict)
    }

    /// Replace the baseline with a fresh reading. A missing reading keeps the
    /// old baseline and returns false.
    pub fn reseed(&mut self, container: &mut Container) -> bool {
        if !container.sensor_present() {
            return false;
        }
        match self.read(container.id()) {
            Some(w) => {
                tracing::debug!(container = %container.id(), weight = w, "baseline reseeded");
                container.set_baseline(w);
                true
            }
            None => false,
        }
    }
}

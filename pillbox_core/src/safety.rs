//! Ambient temperature excursion check.

use crate::container::Containers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyStatus {
    Clear,
    /// Ambient exceeds at least one container's ceiling. Applies to all containers.
    Alert,
}

/// True when `ambient_c` is strictly above any configured ceiling.
pub fn exceeds_any(ambient_c: f32, containers: &Containers) -> bool {
    containers
        .iter()
        .any(|c| ambient_c > f32::from(c.max_temperature()))
}

/// Tracks whether the global alert is currently raised so transitions are logged once.
#[derive(Debug, Default)]
pub struct SafetyMonitor {
    active: bool,
}

impl SafetyMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ambient_c: f32, containers: &Containers) -> SafetyStatus {
        let alert = exceeds_any(ambient_c, containers);
        match (self.active, alert) {
            (false, true) => tracing::warn!(ambient_c, "temperature excursion raised"),
            (true, false) => tracing::info!(ambient_c, "temperature excursion cleared"),
            _ => {}
        }
        self.active = alert;
        if alert {
            SafetyStatus::Alert
        } else {
            SafetyStatus::Clear
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

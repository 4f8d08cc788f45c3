//! Dose times, bounded per-container schedules, and due evaluation.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::CONTAINER_COUNT;
use crate::container::{ContainerId, Containers};

/// Dose entries a single container can hold.
pub const MAX_DOSES: usize = pillbox_config::MAX_DOSES;

/// A time of day, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DoseTime {
    hour: u8,
    minute: u8,
}

impl DoseTime {
    /// `None` unless `hour < 24` and `minute < 60`.
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    /// Whether `now` falls inside this dose's minute.
    pub fn matches(self, now: NaiveDateTime) -> bool {
        now.hour() == u32::from(self.hour) && now.minute() == u32::from(self.minute)
    }
}

impl std::fmt::Display for DoseTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Up to `MAX_DOSES` entries in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    doses: Vec<DoseTime>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a dose. Returns false (and drops it) once the schedule is full.
    pub fn push(&mut self, dose: DoseTime) -> bool {
        if self.doses.len() >= MAX_DOSES {
            return false;
        }
        self.doses.push(dose);
        true
    }

    pub fn len(&self) -> usize {
        self.doses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doses.is_empty()
    }

    pub fn doses(&self) -> &[DoseTime] {
        &self.doses
    }

    pub fn matches(&self, now: NaiveDateTime) -> bool {
        self.doses.iter().any(|d| d.matches(now))
    }
}

/// A specific calendar minute a dose was dispensed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    date: NaiveDate,
    hour: u32,
    minute: u32,
}

impl Slot {
    fn of(now: NaiveDateTime) -> Self {
        Self {
            date: now.date(),
            hour: now.hour(),
            minute: now.minute(),
        }
    }
}

/// Evaluates schedules against wall time, remembering which minute each
/// container was last served so a dose fires at most once per slot.
///
/// Missed minutes are never redelivered.
#[derive(Debug, Default)]
pub struct ScheduleEngine {
    served: [Option<Slot>; CONTAINER_COUNT],
}

impl ScheduleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Containers whose schedule matches `now`, excluding those already
    /// `ready` and those served for this very minute.
    pub fn due_containers(&self, now: NaiveDateTime, containers: &Containers) -> Vec<ContainerId> {
        let slot = Slot::of(now);
        containers
            .iter()
            .filter(|c| !c.is_ready())
            .filter(|c| self.served[c.id().index()] != Some(slot))
            .filter(|c| c.schedule().matches(now))
            .map(|c| c.id())
            .collect()
    }

    /// Record that `id` was dispensed for the minute containing `now`.
    pub fn mark_served(&mut self, id: ContainerId, now: NaiveDateTime) {
        self.served[id.index()] = Some(Slot::of(now));
    }
}

//! The container entity and the fixed five-slot collection that owns them.

use std::fmt;

use crate::CONTAINER_COUNT;
use crate::actuator::MotionDone;
use crate::config::DoorGeometry;
use crate::schedule::Schedule;

/// Zero-based container index; displayed 1-based as on the front panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerId(u8);

impl ContainerId {
    pub const FIRST: ContainerId = ContainerId(0);

    pub fn new(index: usize) -> Option<Self> {
        (index < CONTAINER_COUNT).then_some(Self(index as u8))
    }

    /// Container selected by front-panel digit `1..=5`.
    pub fn from_digit(d: u8) -> Option<Self> {
        d.checked_sub(1).and_then(|i| Self::new(usize::from(i)))
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Front-panel number, 1-based.
    pub fn number(self) -> u8 {
        self.0 + 1
    }

    pub fn next(self) -> Option<Self> {
        Self::new(self.index() + 1)
    }

    pub fn all() -> impl Iterator<Item = ContainerId> {
        (0..CONTAINER_COUNT as u8).map(ContainerId)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// What the setup phase collects for one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSetup {
    pub schedule: Schedule,
    pub max_temperature: u8,
}

#[derive(Debug, Clone)]
pub struct Container {
    id: ContainerId,
    geometry: DoorGeometry,
    schedule: Schedule,
    max_temperature: u8,
    door_open: bool,
    ready: bool,
    sensor_present: bool,
    baseline_weight: f32,
}

impl Container {
    fn new(id: ContainerId, geometry: DoorGeometry, sensor_present: bool) -> Self {
        Self {
            id,
            geometry,
            schedule: Schedule::new(),
            max_temperature: 0,
            door_open: false,
            ready: false,
            sensor_present,
            baseline_weight: 0.0,
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn geometry(&self) -> DoorGeometry {
        self.geometry
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn dose_count(&self) -> usize {
        self.schedule.len()
    }

    pub fn max_temperature(&self) -> u8 {
        self.max_temperature
    }

    pub fn door_open(&self) -> bool {
        self.door_open
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn sensor_present(&self) -> bool {
        self.sensor_present
    }

    /// Reference weight for consumption detection; `None` without a sensor.
    pub fn baseline_weight(&self) -> Option<f32> {
        self.sensor_present.then_some(self.baseline_weight)
    }

    /// Only the actuator can produce a `MotionDone`, so it is the sole writer.
    pub(crate) fn latch_door(&mut self, open: bool, _done: MotionDone) {
        self.door_open = open;
    }

    pub(crate) fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub(crate) fn set_baseline(&mut self, weight: f32) {
        if self.sensor_present {
            self.baseline_weight = weight;
        }
    }
}

/// The five containers, indexed by `ContainerId`.
#[derive(Debug, Clone)]
pub struct Containers {
    slots: [Container; CONTAINER_COUNT],
}

impl Containers {
    pub fn new(
        doors: [DoorGeometry; CONTAINER_COUNT],
        sensors: [bool; CONTAINER_COUNT],
    ) -> Self {
        let mut i = 0;
        let slots = doors.map(|geometry| {
            let c = Container::new(ContainerId(i as u8), geometry, sensors[i]);
            i += 1;
            c
        });
        Self { slots }
    }

    pub fn get(&self, id: ContainerId) -> &Container {
        &self.slots[id.index()]
    }

    pub fn get_mut(&mut self, id: ContainerId) -> &mut Container {
        &mut self.slots[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Container> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Container> {
        self.slots.iter_mut()
    }

    pub fn any_open(&self) -> bool {
        self.slots.iter().any(Container::door_open)
    }

    /// Replace a container's schedule and ceiling.
    pub fn configure(&mut self, id: ContainerId, setup: ContainerSetup) {
        let c = self.get_mut(id);
        c.schedule = setup.schedule;
        c.max_temperature = setup.max_temperature;
    }
}

impl std::ops::Index<ContainerId> for Containers {
    type Output = Container;

    fn index(&self, id: ContainerId) -> &Container {
        self.get(id)
    }
}

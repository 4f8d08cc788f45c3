//! Door sequencing. The coordinator moves a servo one degree at a time and is
//! the only code that can flip a container's `door_open` flag.

use std::sync::Arc;
use std::time::Duration;

use eyre::WrapErr;
use pillbox_traits::{Clock, Servo};

use crate::container::{Container, Containers};
use crate::error::Result;
use crate::hw_error::map_hw_error;

/// Proof that a door finished moving. Only this module can construct one.
pub(crate) struct MotionDone(());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorTarget {
    Open,
    Closed,
}

pub struct ActuatorCoordinator {
    servos: Vec<Box<dyn Servo>>,
    clock: Arc<dyn Clock + Send + Sync>,
    step: Duration,
}

impl ActuatorCoordinator {
    /// One servo per container, in container order.
    pub fn new(
        servos: Vec<Box<dyn Servo>>,
        clock: Arc<dyn Clock + Send + Sync>,
        step: Duration,
    ) -> Self {
        Self {
            servos,
            clock,
            step,
        }
    }

    /// Drive `container`'s door to `target`, then latch its flag.
    ///
    /// Motion runs to completion once started. If a write fails the door is
    /// left where it stopped and the flag keeps its previous value.
    pub fn set_door(&mut self, container: &mut Container, target: DoorTarget) -> Result<()> {
        let id = container.id();
        let geometry = container.geometry();
        let goal = match target {
            DoorTarget::Open => geometry.open_angle,
            DoorTarget::Closed => geometry.close_angle,
        };
        let servo = self
            .servos
            .get_mut(id.index())
            .ok_or_else(|| eyre::eyre!("no servo wired for container {id}"))?;

        let mut pos = servo.position();
        tracing::debug!(container = %id, from = pos, to = goal, ?target, "door motion");
        while pos != goal {
            pos = if pos < goal { pos + 1 } else { pos - 1 };
            servo
                .write(pos)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err_with(|| format!("servo write failed for container {id} at {pos}"))?;
            tracing::trace!(container = %id, angle = pos, "step");
            self.clock.sleep(self.step);
        }

        container.latch_door(target == DoorTarget::Open, MotionDone(()));
        Ok(())
    }

    /// Close every door at power-up. Failures are logged and the first is returned
    /// after all doors have been attempted.
    pub fn home_all(&mut self, containers: &mut Containers) -> Result<()> {
        let mut first_err = None;
        for c in containers.iter_mut() {
            if let Err(e) = self.set_door(c, DoorTarget::Closed) {
                tracing::warn!(container = %c.id(), error = %e, "homing failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

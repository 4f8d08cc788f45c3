#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Dispenser control logic (hardware-agnostic).
//!
//! All hardware interactions go through the `pillbox_traits` boundaries; the
//! CLI and tests supply simulated or GPIO-backed implementations.
//!
//! ## Architecture
//!
//! - **Containers**: five fixed slots with door, ready, and baseline state (`container`)
//! - **Schedule Engine**: minute-resolution dose matching with a served-slot guard (`schedule`)
//! - **Consumption Monitor**: load cell sampling and classification (`consumption`)
//! - **Actuator Coordinator**: stepwise door motion, sole writer of door state (`actuator`)
//! - **Safety**: global ambient temperature excursion check (`safety`)
//! - **Notifier Gateway**: best-effort outbound messages (`notifier`)
//! - **Session Controller**: the poll-driven state machine (`controller`)

pub mod actuator;
pub mod alert;
pub mod builder;
pub mod config;
pub mod consumption;
pub mod container;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod input;
pub mod mocks;
pub mod notifier;
pub mod runner;
pub mod safety;
pub mod schedule;
pub mod screen;
pub mod status;

/// Number of containers on the appliance.
pub const CONTAINER_COUNT: usize = pillbox_config::CONTAINER_COUNT;

pub use actuator::{ActuatorCoordinator, DoorTarget};
pub use builder::{Missing, SessionBuilder, Set};
pub use config::{ConsumptionCfg, DoorGeometry, NotifyCfg, Timeouts, TimingCfg};
pub use consumption::{Consumption, ConsumptionMonitor, classify_reading};
pub use container::{Container, ContainerId, ContainerSetup, Containers};
pub use controller::SessionController;
pub use error::{BuildError, CoreError, Result};
pub use notifier::{Delivery, NotifierGateway};
pub use runner::{RunSummary, StopReason};
pub use safety::{SafetyMonitor, SafetyStatus};
pub use schedule::{DoseTime, MAX_DOSES, Schedule, ScheduleEngine};
pub use status::{PhaseKind, SessionStats};

//! Peripheral implementations for the dispenser.
//!
//! Simulated devices are always available; GPIO drivers for the HX711 load
//! cell amplifier and PWM door servos are behind the `hardware` feature.

pub mod error;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod hx711;
#[cfg(feature = "hardware")]
pub mod servo;

pub use sim::{
    DisplayProbe, IndicatorProbe, KeyQueue, LogNotifier, OutboxProbe, RtcProbe, ScriptedKeypad,
    ServoProbe, SimulatedDisplay, SimulatedIndicator, SimulatedLoadCell, SimulatedRtc,
    SimulatedServo, WeightProbe,
};

#[cfg(feature = "hardware")]
pub use hx711::HardwareLoadCell;
#[cfg(feature = "hardware")]
pub use servo::PwmServo;

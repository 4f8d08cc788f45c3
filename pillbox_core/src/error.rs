use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("timeout waiting for device")]
    Timeout,
    #[error("real-time clock unavailable: {0}")]
    ClockUnavailable(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing real-time clock")]
    MissingClock,
    #[error("missing keypad")]
    MissingKeypad,
    #[error("missing door servos")]
    MissingServos,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

//! Observable controller phase and session counters.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    /// Waiting for a `DDMMYYYYHHMMSS` entry after clock power loss.
    SetClock,
    /// Manual pre-fill door toggling.
    Welcome,
    /// Collecting schedules and ceilings, one container at a time.
    Configure,
    Monitoring,
    Dispensing,
    /// Startup failed; needs a manual reset.
    Halted,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseKind::SetClock => "set-clock",
            PhaseKind::Welcome => "welcome",
            PhaseKind::Configure => "configure",
            PhaseKind::Monitoring => "monitoring",
            PhaseKind::Dispensing => "dispensing",
            PhaseKind::Halted => "halted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub doses_triggered: u32,
    pub doses_taken: u32,
    /// Doses that fell due while another dispensing window was open.
    pub doses_missed: u32,
    pub low_stock_alerts: u32,
    pub safety_alerts: u32,
    pub notification_failures: u32,
    pub actuator_faults: u32,
}

//! Drives a controller until it halts, a shutdown is requested, or a run limit passes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pillbox_traits::Clock;

use crate::controller::SessionController;
use crate::error::Result;
use crate::status::{PhaseKind, SessionStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Halted,
    Shutdown,
    RunLimit,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reason: StopReason,
    pub final_phase: PhaseKind,
    pub polls: u64,
    pub elapsed_ms: u64,
    pub stats: SessionStats,
}

/// Start `controller` and poll it until one of the stop conditions holds.
///
/// `clock` must be the same clock the controller sleeps on; the run limit is
/// measured on it, so a manual clock bounds a simulated run in simulated time.
/// A clock failure at startup is returned as an error.
pub fn run(
    controller: &mut SessionController,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: &AtomicBool,
    limit: Option<Duration>,
) -> Result<RunSummary> {
    let epoch = clock.now();
    controller.start()?;

    let limit_ms = limit.map(|d| d.as_millis() as u64);
    let mut polls = 0u64;
    let reason = loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested");
            break StopReason::Shutdown;
        }
        if limit_ms.is_some_and(|l| clock.ms_since(epoch) >= l) {
            tracing::info!(elapsed_ms = clock.ms_since(epoch), "run limit reached");
            break StopReason::RunLimit;
        }
        let phase = controller.poll()?;
        polls += 1;
        if phase == PhaseKind::Halted {
            break StopReason::Halted;
        }
    };

    Ok(RunSummary {
        reason,
        final_phase: controller.phase().unwrap_or(PhaseKind::Halted),
        polls,
        elapsed_ms: clock.ms_since(epoch),
        stats: controller.stats().clone(),
    })
}

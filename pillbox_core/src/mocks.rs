//! Do-nothing peripherals used when the builder is not given one.

use pillbox_traits::{Color, Indicator, Notifier, StatusDisplay};

pub struct NoopDisplay;

impl StatusDisplay for NoopDisplay {
    fn show(&mut self, _top: &str, _bottom: &str) {}
}

pub struct NoopIndicator;

impl Indicator for NoopIndicator {
    fn set_color(&mut self, _color: Color) {}
    fn set_buzzer(&mut self, _on: bool) {}
}

/// Drops every message and reports success.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(
        &mut self,
        recipient: &str,
        _message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(recipient, "notifier not configured; message dropped");
        Ok(())
    }
}

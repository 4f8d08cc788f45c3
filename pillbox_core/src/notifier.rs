//! Outbound notification boundary. Failures never stop dispensing.

use pillbox_traits::Notifier;

use crate::config::NotifyCfg;
use crate::hw_error::map_hw_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Ack,
    Fail,
}

pub struct NotifierGateway {
    inner: Box<dyn Notifier>,
    cfg: NotifyCfg,
}

impl NotifierGateway {
    pub fn new(inner: Box<dyn Notifier>, cfg: NotifyCfg) -> Self {
        Self { inner, cfg }
    }

    pub fn notify(&mut self, recipient: &str, message: &str) -> Delivery {
        match self.inner.notify(recipient, message) {
            Ok(()) => {
                tracing::info!(recipient, "notification delivered");
                Delivery::Ack
            }
            Err(e) => {
                let err = map_hw_error(&*e);
                tracing::warn!(recipient, error = %err, "notification failed");
                Delivery::Fail
            }
        }
    }

    /// Send the configured dose-ready message to the configured recipient.
    pub fn dose_ready(&mut self) -> Delivery {
        let NotifyCfg { recipient, message } = self.cfg.clone();
        self.notify(&recipient, &message)
    }
}

//! Channel-backed keypad fed from a key script or a stdin reader thread.
//!
//! The controller polls without blocking; keys arrive through a
//! crossbeam channel whose sender lives in the reader thread (or is
//! dropped right after a script has been queued).

use crossbeam_channel as xch;
use pillbox_traits::{Key, Keypad};
use std::io::BufRead;

pub struct ChannelKeypad {
    rx: xch::Receiver<Key>,
}

impl ChannelKeypad {
    /// Queue every recognised key legend in `script`; other characters are skipped.
    pub fn from_script(script: &str) -> Self {
        let (tx, rx) = xch::unbounded();
        for key in script.chars().filter_map(Key::from_char) {
            // Receiver is alive in `rx`; send cannot fail here.
            let _ = tx.send(key);
        }
        Self { rx }
    }

    /// Read key legends from stdin line by line on a background thread.
    ///
    /// The thread exits on EOF, on a read error, or once the keypad is dropped.
    pub fn spawn_stdin() -> Self {
        let (tx, rx) = xch::unbounded();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    tracing::debug!("stdin closed with error, keypad reader exiting");
                    break;
                };
                for key in line.chars().filter_map(Key::from_char) {
                    if tx.send(key).is_err() {
                        tracing::debug!("keypad consumer disconnected, exiting reader");
                        return;
                    }
                }
            }
            tracing::trace!("keypad reader reached EOF");
        });
        Self { rx }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Keypad for ChannelKeypad {
    fn poll(&mut self) -> Option<Key> {
        self.rx.try_recv().ok()
    }
}

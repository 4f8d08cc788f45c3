use std::time::Duration;

use pillbox_traits::LoadCell;
use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::wait_until_low_with_timeout;

/// Channel A, gain 128.
const GAIN_PULSES: u8 = 25;
const TARE_SAMPLES: usize = 8;

pub struct Hx711 {
    dt: InputPin,
    sck: OutputPin,
    gain_pulses: u8,
}

impl Hx711 {
    pub fn open(dt_pin: u8, sck_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dt = gpio
            .get(dt_pin)
            .map_err(|e| HwError::Gpio(format!("open hx711 dt {dt_pin}: {e}")))?
            .into_input();
        let mut sck = gpio
            .get(sck_pin)
            .map_err(|e| HwError::Gpio(format!("open hx711 sck {sck_pin}: {e}")))?
            .into_output();
        sck.set_low(); // clock idles low
        Ok(Self {
            dt,
            sck,
            gain_pulses: GAIN_PULSES,
        })
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        let dt = &self.dt;
        wait_until_low_with_timeout(|| dt.is_high(), timeout, Duration::from_micros(200))?;

        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            std::hint::spin_loop();
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            std::hint::spin_loop();
        }

        // Extra pulses select channel/gain for the next conversion
        for _ in 0..self.gain_pulses {
            self.sck.set_high();
            std::hint::spin_loop();
            self.sck.set_low();
            std::hint::spin_loop();
        }

        if (value & 0x80_0000) != 0 {
            value |= !0xFF_FFFF;
        }
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }
}

/// HX711-backed load cell reporting calibrated units.
pub struct HardwareLoadCell {
    hx711: Hx711,
    cal_factor: f32,
    tare_counts: i32,
}

impl HardwareLoadCell {
    /// Open the amplifier and tare against the current (empty) reading.
    pub fn new(dt_pin: u8, sck_pin: u8, cal_factor: f32, timeout: Duration) -> Result<Self> {
        let mut hx711 = Hx711::open(dt_pin, sck_pin)?;
        let mut sum: i64 = 0;
        for _ in 0..TARE_SAMPLES {
            sum += i64::from(hx711.read_with_timeout(timeout)?);
        }
        let tare_counts = (sum / TARE_SAMPLES as i64) as i32;
        tracing::info!(dt_pin, sck_pin, tare_counts, cal_factor, "load cell ready");
        Ok(Self {
            hx711,
            cal_factor,
            tare_counts,
        })
    }
}

impl LoadCell for HardwareLoadCell {
    fn read(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<f32>, Box<dyn std::error::Error + Send + Sync>> {
        let mut attempts = 0;
        let max_attempts = 3;
        loop {
            match self.hx711.read_with_timeout(timeout) {
                Ok(raw) => {
                    let units = (raw - self.tare_counts) as f32 / self.cal_factor;
                    return Ok(Some(units));
                }
                Err(HwError::DataReadyTimeout) if attempts < max_attempts => {
                    attempts += 1;
                    tracing::debug!(retries = attempts, "load cell not ready, retrying");
                }
                // Still converting: report a stale sample rather than a fault
                Err(HwError::DataReadyTimeout) => return Ok(None),
                Err(e) => {
                    tracing::error!(error = %e, "load cell read error");
                    return Err(Box::new(e));
                }
            }
        }
    }
}

use std::time::Duration;

use pillbox_traits::Servo;
use rppal::gpio::{Gpio, OutputPin};

use crate::error::{HwError, Result};
use crate::util::servo_pulse_us;

const PWM_PERIOD: Duration = Duration::from_millis(20);

/// Hobby servo driven by rppal software PWM on a GPIO pin.
pub struct PwmServo {
    pin: OutputPin,
    angle: u8,
}

impl PwmServo {
    pub fn new(gpio_pin: u8, initial_angle: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(gpio_pin)
            .map_err(|e| HwError::Gpio(format!("open servo pin {gpio_pin}: {e}")))?
            .into_output();
        let mut servo = Self {
            pin,
            angle: initial_angle,
        };
        servo.apply(initial_angle)?;
        Ok(servo)
    }

    fn apply(&mut self, angle: u8) -> Result<()> {
        let pulse = Duration::from_micros(servo_pulse_us(angle));
        self.pin
            .set_pwm(PWM_PERIOD, pulse)
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        self.angle = angle;
        Ok(())
    }
}

impl Servo for PwmServo {
    fn position(&self) -> u8 {
        self.angle
    }

    fn write(&mut self, angle: u8) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.apply(angle).map_err(|e| Box::new(e) as _)
    }
}

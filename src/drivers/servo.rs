//! Servo PWM driver (two channels on one LEDC timer).
//!
//! Config values are in microseconds: `period` retunes the shared timer
//! frequency, the compare values become per-channel duty fractions at
//! 14-bit resolution. Applied synchronously from the dispatcher when a
//! servo-set command arrives and once at boot with the loaded config.

use log::warn;

use crate::drivers::hw_init;
use crate::node::ports::ServoDriver;
use crate::pins;

pub struct ServoPwm {
    applied: (u16, u16, u16),
}

impl ServoPwm {
    pub const fn new() -> Self {
        Self { applied: (0, 0, 0) }
    }

    /// Last (pwm1, pwm2, period) written to the peripheral.
    pub fn applied(&self) -> (u16, u16, u16) {
        self.applied
    }

    fn duty(compare: u16, period: u16) -> u32 {
        (u32::from(compare) << pins::SERVO_DUTY_BITS) / u32::from(period)
    }
}

impl ServoDriver for ServoPwm {
    fn set_pwm(&mut self, pwm1: u16, pwm2: u16, period: u16) {
        if period == 0 {
            // A zero period would stop the timer dead; leave the
            // outputs where they are.
            warn!("servo: ignoring zero period");
            return;
        }
        hw_init::ledc_set_frequency(pins::SERVO_TIMER_HZ / u32::from(period));
        hw_init::ledc_set(hw_init::LEDC_CH_SERVO1, Self::duty(pwm1, period));
        hw_init::ledc_set(hw_init::LEDC_CH_SERVO2, Self::duty(pwm2, period));
        self.applied = (pwm1, pwm2, period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_applied_values() {
        let mut servo = ServoPwm::new();
        servo.set_pwm(1500, 1200, 20_000);
        assert_eq!(servo.applied(), (1500, 1200, 20_000));
    }

    #[test]
    fn zero_period_is_ignored() {
        let mut servo = ServoPwm::new();
        servo.set_pwm(1500, 1500, 20_000);
        servo.set_pwm(1000, 1000, 0);
        assert_eq!(servo.applied(), (1500, 1500, 20_000));
    }

    #[test]
    fn duty_is_proportional_to_compare() {
        // Full period = full scale.
        assert_eq!(ServoPwm::duty(20_000, 20_000), 1 << pins::SERVO_DUTY_BITS);
        // Half period = half scale.
        assert_eq!(
            ServoPwm::duty(10_000, 20_000),
            (1 << pins::SERVO_DUTY_BITS) / 2
        );
    }
}

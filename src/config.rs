//! Node configuration.
//!
//! All tunable parameters for one bus node. Loaded once at boot from
//! non-volatile storage (compiled-in defaults when the stored image is
//! missing or invalid), mutated only by explicit config-write commands,
//! persisted only by the explicit save command.

use serde::{Deserialize, Serialize};

/// Servo output parameters, applied to the PWM peripheral as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoConfig {
    /// Channel 1 compare value (pulse width, timer ticks).
    pub pwm1: u16,
    /// Channel 2 compare value (pulse width, timer ticks).
    pub pwm2: u16,
    /// Timer period (frame length, timer ticks).
    pub period: u16,
}

/// Stepper travel limits and homing behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepperConfig {
    /// Rest position the homing run settles at.
    pub minpos: u16,
    /// Soft travel limit in micro-steps.
    pub maxpos: u16,
    /// Extra travel above `maxpos` at the start of a homing run.
    pub overrun: u16,
}

/// Core node configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's bus address.
    pub address: u8,
    pub servo: ServoConfig,
    pub stepper: StepperConfig,
    /// Whether motion commands (goto/zero/off) acknowledge with a
    /// header-only reply. Off by default: on a polled multi-drop bus
    /// the master usually follows up with a position query anyway.
    pub ack_motion: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: 0x40,
            servo: ServoConfig {
                // 1.5 ms centre pulses in a 20 ms frame at 1 µs ticks.
                pwm1: 1500,
                pwm2: 1500,
                period: 20_000,
            },
            stepper: StepperConfig {
                minpos: 0,
                // 960 full steps of travel at 8 micro-steps each.
                maxpos: 7680,
                overrun: 96,
            },
            ack_motion: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = NodeConfig::default();
        assert!(c.stepper.maxpos > c.stepper.minpos);
        assert!(u32::from(c.stepper.maxpos) + u32::from(c.stepper.overrun) <= 0xFFFF);
        assert!(c.servo.pwm1 <= c.servo.period);
        assert!(c.servo.pwm2 <= c.servo.period);
        assert!(!c.ack_motion);
    }

    #[test]
    fn serde_roundtrip() {
        let c = NodeConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: NodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn postcard_roundtrip() {
        let c = NodeConfig {
            address: 0x41,
            ack_motion: true,
            ..Default::default()
        };
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: NodeConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c, c2);
    }
}

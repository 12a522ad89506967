//! Port traits — the boundary between the node core and the hardware.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ dispatcher / motion engine
//! ```
//!
//! Driven adapters (NVS storage, LEDC PWM, coil GPIOs) implement these
//! traits. The dispatcher and motion controller consume them via
//! generics, so the core never touches hardware directly and the whole
//! command surface runs against mocks on the host.

use crate::config::NodeConfig;
use crate::error::ConfigError;

/// Persistent configuration storage.
pub trait ConfigStore {
    /// Load the configuration.
    ///
    /// Must return compiled-in defaults when storage is uninitialized or
    /// fails the validity check — a node always boots with a usable
    /// config, and storage faults are never surfaced to the bus.
    fn load(&self) -> NodeConfig;

    /// Validate and persist the configuration synchronously; the save
    /// command only acknowledges after this returns.
    fn save(&mut self, config: &NodeConfig) -> Result<(), ConfigError>;
}

/// Servo PWM generation (two channels sharing one timer period).
pub trait ServoDriver {
    /// Apply compare and period values to the PWM peripheral.
    fn set_pwm(&mut self, pwm1: u16, pwm2: u16, period: u16);
}

/// The four stepper coil-control outputs.
pub trait CoilDriver {
    /// Drive the coils from a 3-bit pattern
    /// (coil 1, coils 2+3 tied, coil 4). A synchronous register write
    /// with no failure mode; `0` de-energizes everything.
    fn set_coil_pattern(&mut self, bits: u8);
}

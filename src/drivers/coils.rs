//! Stepper coil output driver.
//!
//! Translates the sequencer's 3-bit pattern into the three GPIO levels
//! (coil 1, tied pair 2+3, coil 4). A dumb actuator: energization
//! policy lives entirely in the motion controller.
//!
//! On ESP-IDF: drives real GPIOs via the hw_init helpers (ISR-safe).
//! On host/test: tracks the last pattern in-memory only.

use crate::drivers::hw_init;
use crate::motion::sequencer::{COIL1, COIL4, COIL23};
use crate::node::ports::CoilDriver;
use crate::pins;

pub struct CoilOutputs {
    last: u8,
}

impl CoilOutputs {
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Last pattern written.
    pub fn pattern(&self) -> u8 {
        self.last
    }
}

impl CoilDriver for CoilOutputs {
    fn set_coil_pattern(&mut self, bits: u8) {
        hw_init::gpio_write(pins::COIL1_GPIO, bits & COIL1 != 0);
        hw_init::gpio_write(pins::COIL23_GPIO, bits & COIL23 != 0);
        hw_init::gpio_write(pins::COIL4_GPIO, bits & COIL4 != 0);
        self.last = bits;
    }
}

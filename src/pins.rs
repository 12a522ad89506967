//! GPIO / peripheral pin assignments for the stepnode board.
//!
//! Single source of truth — every driver references this module rather
//! than hard-coding pin numbers. Change a pin here and it propagates
//! everywhere.

// ---------------------------------------------------------------------------
// Stepper coil outputs (ULN2003 darlington array)
// ---------------------------------------------------------------------------

/// Coil 1 drive.
pub const COIL1_GPIO: i32 = 4;
/// Coils 2 and 3 are tied together by the motor's drive waveform and
/// share one output.
pub const COIL23_GPIO: i32 = 5;
/// Coil 4 drive.
pub const COIL4_GPIO: i32 = 6;

// ---------------------------------------------------------------------------
// RS-485 transceiver (MAX3485)
// ---------------------------------------------------------------------------

/// UART TX into the transceiver's DI pin.
pub const BUS_TX_GPIO: i32 = 21;
/// UART RX from the transceiver's RO pin.
pub const BUS_RX_GPIO: i32 = 20;
/// Driver-enable (DE + /RE tied). HIGH = transmitting.
pub const BUS_DE_GPIO: i32 = 10;

/// Bus baud rate. The master polls every node at this fixed speed.
pub const BUS_BAUD: u32 = 57_600;

// ---------------------------------------------------------------------------
// Servo outputs (LEDC)
// ---------------------------------------------------------------------------

pub const SERVO1_GPIO: i32 = 2;
pub const SERVO2_GPIO: i32 = 3;

/// LEDC tick rate: 1 MHz so config values are in microseconds.
pub const SERVO_TIMER_HZ: u32 = 1_000_000;

/// Servo frame length used until the loaded config is applied (20 ms).
pub const SERVO_DEFAULT_PERIOD_US: u32 = 20_000;

/// LEDC duty resolution used for the servo channels.
pub const SERVO_DUTY_BITS: u32 = 14;

// ---------------------------------------------------------------------------
// Motion tick
// ---------------------------------------------------------------------------

/// Step timer period. 0.5 ms per motion tick.
pub const STEP_TICK_US: u64 = 500;

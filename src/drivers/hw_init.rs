//! One-shot hardware peripheral initialization and raw I/O helpers.
//!
//! Configures GPIO directions and the LEDC servo timer/channels using
//! raw ESP-IDF sys calls. Called once from `main()` before the bus and
//! step timer start. The `gpio_write`/`ledc_set` helpers are the single
//! funnel every driver uses for register-level output.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    UartInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={rc})"),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={rc})"),
            Self::UartInitFailed(rc) => write!(f, "UART init failed (rc={rc})"),
        }
    }
}

/// LEDC channel for servo output 1.
pub const LEDC_CH_SERVO1: u32 = 0;
/// LEDC channel for servo output 2.
pub const LEDC_CH_SERVO2: u32 = 1;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the mainline loop;
    // single-threaded at this point.
    unsafe {
        init_gpio_outputs()?;
        init_ledc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    let output_pins = [
        pins::COIL1_GPIO,
        pins::COIL23_GPIO,
        pins::COIL4_GPIO,
        pins::BUS_DE_GPIO,
    ];

    for &pin in &output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        // Everything starts low: coils de-energized, bus driver off.
        let ret = unsafe { gpio_set_level(pin, 0) };
        if ret != ESP_OK {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }
    info!("hw_init: coil + driver-enable outputs configured");
    Ok(())
}

/// Set a GPIO output level. ISR-safe.
#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: pin was configured as an output in init_gpio_outputs().
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── LEDC (servo PWM) ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    let timer_cfg = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_14_BIT,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        freq_hz: pins::SERVO_TIMER_HZ / pins::SERVO_DEFAULT_PERIOD_US,
        clk_cfg: ledc_clk_cfg_t_LEDC_AUTO_CLK,
        deconfigure: false,
    };
    let ret = unsafe { ledc_timer_config(&timer_cfg) };
    if ret != ESP_OK {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    for (channel, gpio) in [
        (LEDC_CH_SERVO1, pins::SERVO1_GPIO),
        (LEDC_CH_SERVO2, pins::SERVO2_GPIO),
    ] {
        let ch_cfg = ledc_channel_config_t {
            gpio_num: gpio,
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel,
            intr_type: ledc_intr_type_t_LEDC_INTR_DISABLE,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        };
        let ret = unsafe { ledc_channel_config(&ch_cfg) };
        if ret != ESP_OK {
            return Err(HwInitError::LedcInitFailed(ret));
        }
    }
    info!("hw_init: LEDC servo channels configured");
    Ok(())
}

/// Update one LEDC channel's duty. Mainline context.
#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u32) {
    // SAFETY: channel was configured in init_ledc().
    unsafe {
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, duty);
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(_channel: u32, _duty: u32) {}

/// Retune the shared servo timer frequency. Mainline context.
#[cfg(target_os = "espidf")]
pub fn ledc_set_frequency(freq_hz: u32) {
    // SAFETY: the timer was configured in init_ledc().
    unsafe {
        ledc_set_freq(
            ledc_mode_t_LEDC_LOW_SPEED_MODE,
            ledc_timer_t_LEDC_TIMER_0,
            freq_hz,
        );
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set_frequency(_freq_hz: u32) {}

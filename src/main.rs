//! Stepnode firmware — main entry point.
//!
//! Boot sequence and the mainline dispatch loop:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ boot: logger → peripherals → NVS config → retarget link /    │
//! │       motion → servo PWM → bus UART → step timer             │
//! │                                                              │
//! │ loop: dispatcher.poll()                                      │
//! │         ├─ message handled → pump reply onto the wire        │
//! │         └─ nothing pending → yield                           │
//! │                                                              │
//! │ preempting contexts: bus-rx task (byte → LinkReceiver)       │
//! │                      step timer  (0.5 ms → MotionController) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use log::{error, info};

use stepnode::adapters::NvsConfigStore;
use stepnode::drivers::coils::CoilOutputs;
use stepnode::drivers::servo::ServoPwm;
use stepnode::drivers::{hw_init, step_timer, uart};
use stepnode::node::CommandDispatcher;
use stepnode::node::ports::{ConfigStore, ServoDriver};

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("stepnode v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = hw_init::init_peripherals() {
        // Without working outputs there is nothing useful to run.
        error!("hw init failed: {e} — halting");
        #[allow(clippy::empty_loop)]
        loop {}
    }

    // Config from NVS, defaults when storage is empty or unreadable.
    let mut store = match NvsConfigStore::new() {
        Ok(s) => s,
        Err(e) => {
            error!("NVS unavailable ({e}) — halting");
            #[allow(clippy::empty_loop)]
            loop {}
        }
    };
    let config = store.load();
    info!(
        "node {:#04x}, travel {}..{}",
        config.address, config.stepper.minpos, config.stepper.maxpos
    );

    // Hand the interrupt contexts their copies before anything fires.
    uart::LINK.with(|l| l.rx.set_address(config.address));
    step_timer::MOTION.with(|m| m.configure(&config.stepper));

    let mut servo = ServoPwm::new();
    servo.set_pwm(config.servo.pwm1, config.servo.pwm2, config.servo.period);

    uart::start().map_err(|e| anyhow::anyhow!("bus init: {e}"))?;
    step_timer::start();

    let mut coils = CoilOutputs::new();
    let mut dispatcher = CommandDispatcher::new(config);

    info!("entering dispatch loop");
    loop {
        let outcome = dispatcher.poll(
            &uart::LINK,
            &step_timer::MOTION,
            &mut servo,
            &mut coils,
            &mut store,
        );
        if outcome.replied {
            uart::pump_tx();
        }
        if !outcome.handled {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

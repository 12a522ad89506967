//! RS-485 UART glue.
//!
//! Owns the shared [`Link`] cell and feeds it from both directions:
//!
//! - A dedicated receive task blocks on the UART and hands every byte
//!   to [`LinkReceiver::on_byte`]. On ESP-IDF the UART driver has no
//!   per-byte user ISR, so this task stands in for the receive
//!   interrupt context — it preempts the mainline exactly the same way,
//!   which is why all access goes through the [`IsrCell`].
//! - [`pump_tx`] drains the transmit state machine after the dispatcher
//!   queues a reply, running the driver-enable line around the frame.
//!
//! [`LinkReceiver::on_byte`]: crate::bus::LinkReceiver::on_byte

use crate::bus::Link;
#[cfg(target_os = "espidf")]
use crate::bus::TxAction;
#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::drivers::hw_init::HwInitError;
#[cfg(target_os = "espidf")]
use crate::pins;
use crate::sync::IsrCell;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// The link state machines, shared between the receive task and the
/// mainline dispatcher. Address is retargeted at boot from the loaded
/// config.
pub static LINK: IsrCell<Link> = IsrCell::new(Link::new(0x00));

#[cfg(target_os = "espidf")]
const BUS_UART: uart_port_t = 1; // UART1; UART0 stays on the console.

/// Configure the bus UART and start the receive task.
#[cfg(target_os = "espidf")]
pub fn start() -> Result<(), HwInitError> {
    let uart_cfg = uart_config_t {
        baud_rate: pins::BUS_BAUD as i32,
        data_bits: uart_word_length_t_UART_DATA_8_BITS,
        parity: uart_parity_t_UART_PARITY_DISABLE,
        stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
        flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
        ..Default::default()
    };

    // SAFETY: one-shot UART bring-up from the single main task.
    unsafe {
        let ret = uart_driver_install(BUS_UART, 256, 0, 0, core::ptr::null_mut(), 0);
        if ret != ESP_OK {
            return Err(HwInitError::UartInitFailed(ret));
        }
        let ret = uart_param_config(BUS_UART, &uart_cfg);
        if ret != ESP_OK {
            return Err(HwInitError::UartInitFailed(ret));
        }
        let ret = uart_set_pin(
            BUS_UART,
            pins::BUS_TX_GPIO,
            pins::BUS_RX_GPIO,
            -1,
            -1,
        );
        if ret != ESP_OK {
            return Err(HwInitError::UartInitFailed(ret));
        }
    }

    // Receive side: one byte at a time into the link state machine.
    std::thread::Builder::new()
        .name("bus-rx".into())
        .stack_size(3072)
        .spawn(rx_task)
        .map_err(|_| HwInitError::UartInitFailed(-1))?;

    log::info!("uart: bus up at {} baud", pins::BUS_BAUD);
    Ok(())
}

#[cfg(target_os = "espidf")]
fn rx_task() {
    let mut byte = 0u8;
    loop {
        // SAFETY: BUS_UART was installed in start(); single reader task.
        let n = unsafe {
            uart_read_bytes(
                BUS_UART,
                (&raw mut byte).cast(),
                1,
                100, // RTOS ticks; just bounds the shutdown latency
            )
        };
        if n == 1 {
            LINK.with(|l| l.rx.on_byte(byte));
        }
    }
}

/// Drain a queued reply onto the wire.
///
/// Called from the mainline after the dispatcher starts a transmission.
/// Runs the transmit state machine to completion: driver-enable up with
/// the first byte, down again once the final byte has physically left
/// the shift register.
#[cfg(target_os = "espidf")]
pub fn pump_tx() {
    loop {
        let action = LINK.with(|l| l.tx.on_ready());
        let byte = match action {
            TxAction::EnableDriver(c) => {
                hw_init::gpio_write(pins::BUS_DE_GPIO, true);
                c
            }
            TxAction::Write(c) => c,
            TxAction::Disable => break,
        };
        // SAFETY: BUS_UART was installed in start(); single writer.
        unsafe {
            uart_write_bytes(BUS_UART, (&raw const byte).cast(), 1);
        }
    }

    // SAFETY: same contract as above.
    unsafe {
        uart_wait_tx_done(BUS_UART, 100);
    }
    if LINK.with(|l| l.tx.on_tx_complete()) {
        hw_init::gpio_write(pins::BUS_DE_GPIO, false);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn start() -> Result<(), HwInitError> {
    log::info!("uart(sim): bus not started");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn pump_tx() {}

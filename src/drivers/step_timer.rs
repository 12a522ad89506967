//! Motion tick timer using ESP-IDF's esp_timer API.
//!
//! Fires every 0.5 ms and runs one motion-controller tick. The callback
//! executes in the ESP timer task context, which preempts the mainline;
//! the shared [`MOTION`] cell keeps the mainline's goto/zero/off/query
//! accesses consistent with the tick.

use crate::motion::MotionController;
use crate::sync::IsrCell;

#[cfg(target_os = "espidf")]
use crate::drivers::coils::CoilOutputs;
#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

/// The motion controller, shared between the step timer and the
/// mainline dispatcher. Configured at boot from the loaded config.
pub static MOTION: IsrCell<MotionController> = IsrCell::new(MotionController::new());

#[cfg(target_os = "espidf")]
static mut STEP_TIMER: esp_timer_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
unsafe extern "C" fn step_tick_cb(_arg: *mut core::ffi::c_void) {
    let mut coils = CoilOutputs::new();
    MOTION.with(|m| m.tick(&mut coils));
}

/// Start the periodic step timer.
#[cfg(target_os = "espidf")]
pub fn start() {
    // SAFETY: STEP_TIMER is written here once at boot from the single
    // main-task context before the callback can fire.
    unsafe {
        let args = esp_timer_create_args_t {
            callback: Some(step_tick_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"step\0".as_ptr() as *const _,
            skip_unhandled_events: true,
        };
        let ret = esp_timer_create(&args, &raw mut STEP_TIMER);
        if ret != ESP_OK {
            log::error!(
                "step_timer: create failed (rc={}) — motor will not move",
                ret
            );
            return;
        }
        let ret = esp_timer_start_periodic(STEP_TIMER, pins::STEP_TICK_US);
        if ret != ESP_OK {
            log::error!("step_timer: start failed (rc={})", ret);
            return;
        }
    }
    info!("step_timer: motion tick at {} µs", pins::STEP_TICK_US);
}

#[cfg(not(target_os = "espidf"))]
pub fn start() {
    log::info!("step_timer(sim): not started (ticks driven by tests)");
}

/// Stop the step timer.
#[cfg(target_os = "espidf")]
pub fn stop() {
    // SAFETY: STEP_TIMER is a valid handle if start() succeeded;
    // null-check prevents touching a never-created timer.
    unsafe {
        if !STEP_TIMER.is_null() {
            esp_timer_stop(STEP_TIMER);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn stop() {}

//! Closed-loop stepper motion engine.
//!
//! A fixed-rate timer tick (0.5 ms) ramps the logical position toward
//! the commanded target and drives the micro-step sequencer. The ramp is
//! a saturating velocity accumulator bounded purely by the remaining
//! distance, which yields trapezoidal-like acceleration profiles without
//! explicit velocity or acceleration parameters:
//!
//! ```text
//!  ramp
//!   255 ┤        ┌────────────┐
//!       │       /              \
//!       │      /                \        ramp = min(ramp+1, 255, delta)
//!     0 ┼─────┘                  └────
//!       └─────────────────────────────▶ ticks
//! ```
//!
//! [`tick`](MotionController::tick) runs in the timer interrupt context;
//! [`goto`](MotionController::goto), [`zero`](MotionController::zero),
//! [`off`](MotionController::off) and
//! [`snapshot`](MotionController::snapshot) run in the mainline under a
//! critical section — the 16-bit fields cannot be read atomically
//! otherwise.

pub mod sequencer;

use crate::config::StepperConfig;
use crate::node::ports::CoilDriver;
use sequencer::{MICROSTEP_SHIFT, MicrostepSequencer};

/// Motion engine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// Coils de-energized, no motion.
    Off,
    /// Tracking `target`.
    On,
    /// Homing toward zero; `goto` is locked out until it completes.
    Zeroing,
}

/// The stepper motion controller.
pub struct MotionController {
    state: MotionState,
    /// Logical position in micro-steps.
    position: u16,
    target: u16,
    /// Saturating velocity accumulator.
    ramp: u8,
    seq: MicrostepSequencer,
    minpos: u16,
    maxpos: u16,
    /// Extra travel added above `maxpos` when homing, compensating for
    /// steps lost before power-on.
    overrun: u16,
}

impl MotionController {
    /// An unconfigured controller, resting off at position 0.
    ///
    /// Used for the static cell; call [`configure`](Self::configure)
    /// with the loaded config before the step timer starts.
    pub const fn new() -> Self {
        Self {
            state: MotionState::Off,
            position: 0,
            target: 0,
            ramp: 0,
            seq: MicrostepSequencer::new(),
            minpos: 0,
            maxpos: 0,
            overrun: 0,
        }
    }

    /// Apply position limits and start the boot homing run.
    pub fn configure(&mut self, cfg: &StepperConfig) {
        self.minpos = cfg.minpos;
        self.maxpos = cfg.maxpos;
        self.overrun = cfg.overrun;
        self.zero(None);
    }

    /// A configured controller, already homing. Test convenience.
    pub fn with_config(cfg: &StepperConfig) -> Self {
        let mut m = Self::new();
        m.configure(cfg);
        m
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    /// Current micro-step phase, for diagnostics and tests.
    pub fn phase(&self) -> u16 {
        self.seq.phase()
    }

    /// Consistent (position, target) pair for the position query.
    /// Mainline context, under a critical section.
    pub fn snapshot(&self) -> (u16, u16) {
        (self.position, self.target)
    }

    /// Seek to `position`, clamped to the configured soft limits.
    ///
    /// Ignored while homing — the zeroing run must not be interrupted.
    /// Mainline context, under a critical section.
    pub fn goto(&mut self, position: u16) {
        if self.state == MotionState::Zeroing {
            return;
        }
        self.target = position.clamp(self.minpos, self.maxpos);
        self.state = MotionState::On;
    }

    /// Restart homing: count down from beyond the physical maximum so
    /// the motor is guaranteed to still be moving when it reaches zero.
    ///
    /// `margin` overrides the configured overrun for this run.
    /// Mainline context, under a critical section.
    pub fn zero(&mut self, margin: Option<u16>) {
        let overrun = margin.unwrap_or(self.overrun);
        self.state = MotionState::Zeroing;
        self.target = 0;
        self.position = self.maxpos.saturating_add(overrun);
    }

    /// De-energize the coils and freeze at the current position.
    /// Mainline context, under a critical section.
    pub fn off(&mut self, coils: &mut impl CoilDriver) {
        self.target = self.position;
        self.state = MotionState::Off;
        coils.set_coil_pattern(0);
    }

    /// Fixed-rate tick. Timer interrupt context.
    pub fn tick(&mut self, coils: &mut impl CoilDriver) {
        // Homing reached zero: settle at the configured rest position.
        if self.state == MotionState::Zeroing && self.position == self.target {
            self.target = self.minpos;
            self.state = MotionState::On;
        }

        let delta = self.position.abs_diff(self.target);

        // Ramp grows while far out, then tracks the remaining distance.
        if delta < u16::from(self.ramp) {
            self.ramp = delta as u8;
        } else if self.ramp < u8::MAX {
            self.ramp += 1;
        }

        let step = (u16::from(self.ramp >> (8 - MICROSTEP_SHIFT)) + 1).min(delta);

        let moved: i16;
        if self.position < self.target {
            moved = step as i16;
            self.position += step;
        } else if self.position > self.target {
            moved = -(step as i16);
            self.position -= step;
        } else {
            moved = 0;
        }

        self.seq.advance(moved);
        let pattern = if self.state == MotionState::Off {
            0
        } else {
            self.seq.pattern()
        };
        coils.set_coil_pattern(pattern);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepperConfig;

    struct RecordingCoils {
        last: Option<u8>,
        writes: usize,
    }

    impl RecordingCoils {
        fn new() -> Self {
            Self {
                last: None,
                writes: 0,
            }
        }
    }

    impl CoilDriver for RecordingCoils {
        fn set_coil_pattern(&mut self, bits: u8) {
            self.last = Some(bits);
            self.writes += 1;
        }
    }

    fn cfg() -> StepperConfig {
        StepperConfig {
            minpos: 0,
            maxpos: 7680,
            overrun: 96,
        }
    }

    /// A controller that has finished its boot homing run.
    fn settled() -> (MotionController, RecordingCoils) {
        let mut m = MotionController::with_config(&cfg());
        let mut coils = RecordingCoils::new();
        for _ in 0..20_000 {
            m.tick(&mut coils);
            if m.state() == MotionState::On && m.snapshot().0 == m.snapshot().1 {
                break;
            }
        }
        assert_eq!(m.state(), MotionState::On);
        (m, coils)
    }

    #[test]
    fn boot_starts_homing_beyond_maxpos() {
        let m = MotionController::with_config(&cfg());
        assert_eq!(m.state(), MotionState::Zeroing);
        let (pos, target) = m.snapshot();
        assert_eq!(pos, 7680 + 96);
        assert_eq!(target, 0);
    }

    #[test]
    fn homing_converges_through_zero_to_minpos() {
        let stepper = StepperConfig {
            minpos: 20,
            maxpos: 7680,
            overrun: 96,
        };
        let mut m = MotionController::with_config(&stepper);
        let mut coils = RecordingCoils::new();
        let mut hit_zero = false;
        for _ in 0..20_000 {
            m.tick(&mut coils);
            if m.snapshot().0 == 0 {
                hit_zero = true;
            }
        }
        assert!(hit_zero, "homing must pass through position 0");
        assert_eq!(m.state(), MotionState::On);
        let (pos, target) = m.snapshot();
        assert_eq!(target, 20);
        assert_eq!(pos, 20);
    }

    #[test]
    fn ramp_is_monotonic_then_tracks_delta() {
        let (mut m, mut coils) = settled();
        m.goto(1000);

        let mut prev_ramp = 0u16;
        let mut decelerating = false;
        loop {
            let (pos, target) = m.snapshot();
            if pos == target {
                break;
            }
            let delta_before = pos.abs_diff(target);
            let ramp_before = u16::from(m.ramp);
            m.tick(&mut coils);
            let ramp_after = u16::from(m.ramp);

            if delta_before < ramp_before {
                decelerating = true;
            }
            if decelerating {
                // Near the target the ramp tracks the remaining distance.
                assert_eq!(ramp_after, delta_before);
            } else {
                assert!(ramp_after >= prev_ramp, "ramp must not dip while accelerating");
            }
            prev_ramp = ramp_after;
        }
        assert!(decelerating, "profile must include a deceleration phase");
    }

    #[test]
    fn position_never_overshoots_target() {
        let (mut m, mut coils) = settled();
        m.goto(1000);
        for _ in 0..10_000 {
            m.tick(&mut coils);
            assert!(m.snapshot().0 <= 1000);
        }
        assert_eq!(m.snapshot().0, 1000);
    }

    #[test]
    fn goto_clamps_to_soft_limits() {
        let (mut m, mut coils) = settled();
        m.goto(60_000);
        assert_eq!(m.snapshot().1, 7680);
        for _ in 0..60_000 {
            m.tick(&mut coils);
        }
        m.goto(0);
        assert_eq!(m.snapshot().1, 0);
    }

    #[test]
    fn goto_is_ignored_while_zeroing() {
        let mut m = MotionController::with_config(&cfg());
        assert_eq!(m.state(), MotionState::Zeroing);
        m.goto(500);
        assert_eq!(m.state(), MotionState::Zeroing);
        assert_eq!(m.snapshot().1, 0, "homing target must survive goto");
    }

    #[test]
    fn zero_is_allowed_any_time() {
        let (mut m, mut coils) = settled();
        m.goto(3000);
        for _ in 0..100 {
            m.tick(&mut coils);
        }
        m.zero(None);
        assert_eq!(m.state(), MotionState::Zeroing);
        assert_eq!(m.snapshot().0, 7680 + 96);
    }

    #[test]
    fn zero_margin_override_is_applied() {
        let (mut m, _) = settled();
        m.zero(Some(200));
        assert_eq!(m.snapshot().0, 7680 + 200);
    }

    #[test]
    fn off_freezes_target_and_kills_coils() {
        let (mut m, mut coils) = settled();
        m.goto(4000);
        for _ in 0..50 {
            m.tick(&mut coils);
        }
        let (pos, _) = m.snapshot();
        m.off(&mut coils);
        assert_eq!(coils.last, Some(0));
        let (pos2, target2) = m.snapshot();
        assert_eq!(pos2, pos);
        assert_eq!(target2, pos);
        // Ticks while off keep the coils dark and the position parked.
        for _ in 0..100 {
            m.tick(&mut coils);
            assert_eq!(coils.last, Some(0));
        }
        assert_eq!(m.snapshot().0, pos);
    }

    #[test]
    fn goto_after_off_reenergizes() {
        let (mut m, mut coils) = settled();
        m.off(&mut coils);
        m.goto(100);
        assert_eq!(m.state(), MotionState::On);
        m.tick(&mut coils);
        assert_ne!(coils.last, Some(0));
    }

    #[test]
    fn tick_writes_pattern_even_when_parked() {
        let (mut m, mut coils) = settled();
        let before = coils.writes;
        m.tick(&mut coils);
        assert_eq!(coils.writes, before + 1);
    }

    #[test]
    fn max_step_is_one_full_step_per_tick() {
        // With an 8-bit ramp and shift 3, the largest per-tick move is
        // (255 >> 5) + 1 = 8 micro-steps = exactly one table entry.
        let (mut m, mut coils) = settled();
        m.goto(7680);
        let mut max_move = 0u16;
        loop {
            let before = m.snapshot().0;
            m.tick(&mut coils);
            let after = m.snapshot().0;
            max_move = max_move.max(after.abs_diff(before));
            if after == 7680 {
                break;
            }
        }
        assert_eq!(max_move, 8);
    }
}

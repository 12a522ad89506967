//! Mainline command dispatcher.
//!
//! One iteration per polled "message ready" event:
//!
//! ```text
//!  poll ──▶ parse ──▶ act (motion / servo / config) ──▶ reply ──▶ ack
//! ```
//!
//! The dispatcher runs in the non-interrupt context. It holds critical
//! sections only for the short shared-state touches — copying the
//! message out, motion mutations, starting the reply — and never while
//! applying PWM values or persisting configuration.
//!
//! Whatever happens to a message (handled, rejected, unknown), the
//! receive buffer is acknowledged exactly once at the end of the
//! iteration; the busy latch is the only backpressure on the bus.

use log::{info, warn};

use crate::bus::{Link, Payload};
use crate::config::NodeConfig;
use crate::error::CommandError;
use crate::motion::MotionController;
use crate::sync::IsrCell;

use super::commands::{Command, id};
use super::ports::{CoilDriver, ConfigStore, ServoDriver};

/// What one dispatcher iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// A message was consumed this iteration.
    pub handled: bool,
    /// A reply was queued on the transmitter; the caller must kick the
    /// transmit path.
    pub replied: bool,
}

impl PollOutcome {
    const IDLE: Self = Self {
        handled: false,
        replied: false,
    };
}

/// The command dispatcher. Owns the live [`NodeConfig`]; the interrupt
/// contexts keep their own copies of the fields they need (the receiver
/// its address, the motion controller its limits).
pub struct CommandDispatcher {
    config: NodeConfig,
}

impl CommandDispatcher {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    /// The live configuration (RAM copy; storage may be older).
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Process at most one pending message. Non-blocking: with nothing
    /// pending this returns immediately and the caller idles.
    pub fn poll(
        &mut self,
        link: &IsrCell<Link>,
        motion: &IsrCell<MotionController>,
        servo: &mut impl ServoDriver,
        coils: &mut impl CoilDriver,
        store: &mut impl ConfigStore,
    ) -> PollOutcome {
        let Some(msg) = link.with(|l| l.rx.poll()) else {
            return PollOutcome::IDLE;
        };

        let reply = self.handle(&msg, link, motion, servo, coils, store);

        let mut replied = false;
        if let Some(payload) = reply {
            replied = link.with(|l| l.tx.start(&payload));
            if !replied {
                // Cannot happen under the one-message-per-iteration
                // discipline; the reply is dropped like any other fault.
                warn!("link: transmitter busy, reply dropped");
            }
        }

        // Exactly once per message, on every path.
        link.with(|l| l.rx.ack());

        PollOutcome {
            handled: true,
            replied,
        }
    }

    fn handle(
        &mut self,
        msg: &Payload,
        link: &IsrCell<Link>,
        motion: &IsrCell<MotionController>,
        servo: &mut impl ServoDriver,
        coils: &mut impl CoilDriver,
        store: &mut impl ConfigStore,
    ) -> Option<Payload> {
        // Empty payload or explicit ping: echo verbatim, same length.
        if msg.is_empty() || msg[0] == id::PING {
            return Payload::from_slice(msg).ok();
        }

        let cmd_id = msg[0];
        let cmd = match Command::parse(msg) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("dispatch: {e}");
                return self.reject(e.id());
            }
        };

        // Default reply header; commands that reply append to it.
        let mut reply = Payload::new();
        let _ = reply.push(self.config.address);
        let _ = reply.push(cmd_id);

        match cmd {
            Command::Ping => Payload::from_slice(msg).ok(),

            Command::SetServo { values } => {
                let servo_cfg = &mut self.config.servo;
                let fields = [
                    &mut servo_cfg.pwm1,
                    &mut servo_cfg.pwm2,
                    &mut servo_cfg.period,
                ];
                for (field, value) in fields.into_iter().zip(values.iter()) {
                    *field = *value;
                }
                let s = self.config.servo;
                servo.set_pwm(s.pwm1, s.pwm2, s.period);
                // No reply: bandwidth matters on a polled bus.
                None
            }

            Command::QueryServo => {
                let s = self.config.servo;
                for value in [s.pwm1, s.pwm2, s.period] {
                    let _ = reply.extend_from_slice(&value.to_be_bytes());
                }
                Some(reply)
            }

            Command::SetAddress {
                old_check,
                new,
                new_check,
            } => {
                if old_check == !self.config.address && new_check == !new {
                    info!(
                        "config: bus address {:#04x} -> {:#04x}",
                        self.config.address, new
                    );
                    self.config.address = new;
                    link.with(|l| l.rx.set_address(new));
                    Some(reply)
                } else {
                    warn!("dispatch: {}", CommandError::BadCheck(cmd_id));
                    self.reject(cmd_id)
                }
            }

            Command::SaveConfig { check } => {
                if check != !self.config.address {
                    warn!("dispatch: {}", CommandError::BadCheck(cmd_id));
                    return self.reject(cmd_id);
                }
                match store.save(&self.config) {
                    Ok(()) => {
                        info!("config: persisted");
                        Some(reply)
                    }
                    Err(e) => {
                        warn!("config: save failed: {e}");
                        self.reject(cmd_id)
                    }
                }
            }

            Command::Goto { position } => {
                motion.with(|m| m.goto(position));
                self.motion_ack(reply)
            }

            Command::Zero { margin } => {
                motion.with(|m| m.zero(margin));
                info!("motion: homing restarted");
                self.motion_ack(reply)
            }

            Command::Off => {
                motion.with(|m| m.off(coils));
                self.motion_ack(reply)
            }

            Command::Get => {
                let (position, target) = motion.with(|m| m.snapshot());
                let _ = reply.extend_from_slice(&position.to_be_bytes());
                let _ = reply.extend_from_slice(&target.to_be_bytes());
                Some(reply)
            }
        }
    }

    /// `[address, '?', rejected id]` — the only error the bus ever sees.
    fn reject(&self, cmd_id: u8) -> Option<Payload> {
        Payload::from_slice(&[self.config.address, id::REJECT, cmd_id]).ok()
    }

    fn motion_ack(&self, reply: Payload) -> Option<Payload> {
        self.config.ack_motion.then_some(reply)
    }
}

//! Command ids and payload parsing.
//!
//! The first payload byte selects the command; an empty payload is an
//! implicit ping. Multi-byte position and servo fields are big-endian on
//! the wire. Parsing here is purely structural (ids, lengths); the
//! semantic safety checks against live state — the complement checks of
//! the address-change and save commands — belong to the dispatcher.

use crate::error::CommandError;

/// Command id bytes.
pub mod id {
    /// Echo the payload verbatim (also implied by an empty payload).
    pub const PING: u8 = b'P';
    /// Bulk-overwrite the servo parameter record. No reply.
    pub const SET_SERVO: u8 = b'S';
    /// Report the servo parameter record.
    pub const QUERY_SERVO: u8 = b's';
    /// Change the node bus address (complement-guarded).
    pub const SET_ADDRESS: u8 = b'A';
    /// Persist the configuration (complement-guarded).
    pub const SAVE_CONFIG: u8 = b'W';
    /// Seek the stepper to an absolute position.
    pub const STEPPER_GOTO: u8 = b'G';
    /// Restart the homing run.
    pub const STEPPER_ZERO: u8 = b'Z';
    /// De-energize the stepper coils.
    pub const STEPPER_OFF: u8 = b'O';
    /// Report stepper position and target.
    pub const STEPPER_GET: u8 = b'Q';
    /// Rejection marker used in replies, never a valid request id.
    pub const REJECT: u8 = b'?';
}

/// Maximum number of u16 values in a servo record update.
pub const SERVO_FIELDS: usize = 3;

/// A structurally valid inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Echo request; the dispatcher replies with the inbound payload.
    Ping,
    /// Overwrite the first `values.len()` fields of the servo record
    /// (pwm1, pwm2, period) and re-apply the PWM outputs.
    SetServo {
        values: heapless::Vec<u16, SERVO_FIELDS>,
    },
    QueryServo,
    /// `old_check` must be the complement of the live address and
    /// `new_check` the complement of `new` — a garbled frame cannot
    /// silently reassign a node's address.
    SetAddress {
        old_check: u8,
        new: u8,
        new_check: u8,
    },
    /// `check` must be the complement of the live address.
    SaveConfig { check: u8 },
    Goto { position: u16 },
    /// Optional override of the homing overrun margin.
    Zero { margin: Option<u16> },
    Off,
    Get,
}

fn be16(hi: u8, lo: u8) -> u16 {
    u16::from_be_bytes([hi, lo])
}

impl Command {
    /// Parse one inbound payload.
    ///
    /// `Err` carries the offending id for the `'?'` rejection reply.
    pub fn parse(payload: &[u8]) -> Result<Self, CommandError> {
        let Some((&cmd, body)) = payload.split_first() else {
            return Ok(Self::Ping);
        };

        match cmd {
            id::PING => Ok(Self::Ping),

            id::SET_SERVO => {
                if body.len() % 2 != 0 || body.len() > 2 * SERVO_FIELDS {
                    return Err(CommandError::BadLength(cmd));
                }
                let mut values = heapless::Vec::new();
                for pair in body.chunks_exact(2) {
                    let _ = values.push(be16(pair[0], pair[1]));
                }
                Ok(Self::SetServo { values })
            }

            id::QUERY_SERVO => match body {
                [] => Ok(Self::QueryServo),
                _ => Err(CommandError::BadLength(cmd)),
            },

            id::SET_ADDRESS => match body {
                [old_check, new, new_check] => Ok(Self::SetAddress {
                    old_check: *old_check,
                    new: *new,
                    new_check: *new_check,
                }),
                _ => Err(CommandError::BadLength(cmd)),
            },

            id::SAVE_CONFIG => match body {
                [check] => Ok(Self::SaveConfig { check: *check }),
                _ => Err(CommandError::BadLength(cmd)),
            },

            id::STEPPER_GOTO => match body {
                [hi, lo] => Ok(Self::Goto {
                    position: be16(*hi, *lo),
                }),
                _ => Err(CommandError::BadLength(cmd)),
            },

            id::STEPPER_ZERO => match body {
                [] => Ok(Self::Zero { margin: None }),
                [hi, lo] => Ok(Self::Zero {
                    margin: Some(be16(*hi, *lo)),
                }),
                _ => Err(CommandError::BadLength(cmd)),
            },

            id::STEPPER_OFF => match body {
                [] => Ok(Self::Off),
                _ => Err(CommandError::BadLength(cmd)),
            },

            id::STEPPER_GET => match body {
                [] => Ok(Self::Get),
                _ => Err(CommandError::BadLength(cmd)),
            },

            other => Err(CommandError::Unknown(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_ping() {
        assert_eq!(Command::parse(&[]), Ok(Command::Ping));
    }

    #[test]
    fn explicit_ping_with_body() {
        assert_eq!(Command::parse(b"P12345"), Ok(Command::Ping));
    }

    #[test]
    fn goto_is_big_endian() {
        // 1000 = 0x03E8
        assert_eq!(
            Command::parse(&[id::STEPPER_GOTO, 0x03, 0xE8]),
            Ok(Command::Goto { position: 1000 })
        );
    }

    #[test]
    fn goto_wrong_length_rejected() {
        assert_eq!(
            Command::parse(&[id::STEPPER_GOTO, 0x03]),
            Err(CommandError::BadLength(id::STEPPER_GOTO))
        );
        assert_eq!(
            Command::parse(&[id::STEPPER_GOTO, 0x03, 0xE8, 0x00]),
            Err(CommandError::BadLength(id::STEPPER_GOTO))
        );
    }

    #[test]
    fn zero_accepts_optional_margin() {
        assert_eq!(
            Command::parse(&[id::STEPPER_ZERO]),
            Ok(Command::Zero { margin: None })
        );
        assert_eq!(
            Command::parse(&[id::STEPPER_ZERO, 0x00, 0x60]),
            Ok(Command::Zero { margin: Some(96) })
        );
        assert_eq!(
            Command::parse(&[id::STEPPER_ZERO, 0x60]),
            Err(CommandError::BadLength(id::STEPPER_ZERO))
        );
    }

    #[test]
    fn set_servo_even_byte_counts_only() {
        let cmd = Command::parse(&[id::SET_SERVO, 0x05, 0xDC, 0x05, 0xDC]).unwrap();
        match cmd {
            Command::SetServo { values } => {
                assert_eq!(&values[..], &[1500, 1500]);
            }
            other => panic!("unexpected parse: {other:?}"),
        }

        assert_eq!(
            Command::parse(&[id::SET_SERVO, 0x05]),
            Err(CommandError::BadLength(id::SET_SERVO))
        );
        assert_eq!(
            Command::parse(&[id::SET_SERVO, 0, 0, 0, 0, 0, 0, 0, 0]),
            Err(CommandError::BadLength(id::SET_SERVO))
        );
    }

    #[test]
    fn set_servo_empty_body_is_valid() {
        let cmd = Command::parse(&[id::SET_SERVO]).unwrap();
        assert_eq!(
            cmd,
            Command::SetServo {
                values: heapless::Vec::new()
            }
        );
    }

    #[test]
    fn set_address_needs_exactly_three_bytes() {
        assert_eq!(
            Command::parse(&[id::SET_ADDRESS, 0xBF, 0x41, 0xBE]),
            Ok(Command::SetAddress {
                old_check: 0xBF,
                new: 0x41,
                new_check: 0xBE,
            })
        );
        assert_eq!(
            Command::parse(&[id::SET_ADDRESS, 0xBF, 0x41]),
            Err(CommandError::BadLength(id::SET_ADDRESS))
        );
    }

    #[test]
    fn unknown_id_carries_the_id() {
        let err = Command::parse(&[0x7E, 1, 2]).unwrap_err();
        assert_eq!(err, CommandError::Unknown(0x7E));
        assert_eq!(err.id(), 0x7E);
    }
}

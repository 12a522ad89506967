//! Byte-at-a-time transmit state machine.
//!
//! Driven by "ready for next byte" events from the transmit interrupt.
//! Each event yields one [`TxAction`] for the driver glue to carry out:
//!
//! ```text
//! start()      Start ──▶ Payload ──▶ Escape ──▶ Payload … ──▶ End ──▶ Done
//!                │ REPLY_START  │ ESCAPE   │ byte^mask          │ REPLY_END
//!                │ + driver on  │          │                    │
//! ```
//!
//! `Done` masks the interrupt source that drives this machine; the
//! physical transmit-complete event (shift register drained) then
//! releases the bus driver-enable line via [`on_tx_complete`].
//!
//! Only one transmission may be in flight. The dispatcher finishes one
//! full request/reply cycle per loop iteration, so it never starts a
//! reply while the previous one is still draining; [`start`] still
//! refuses to clobber an active transmission.
//!
//! [`start`]: LinkTransmitter::start
//! [`on_tx_complete`]: LinkTransmitter::on_tx_complete

use super::frame::{ESCAPE, ESCAPE_MASK, MAX_PAYLOAD, REPLY_END, REPLY_START, needs_escape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    /// No transmission in flight.
    Idle,
    /// Emit the reply-start marker and enable the bus driver.
    Start,
    /// Emit the next payload byte (or its escape prefix).
    Payload,
    /// Escape prefix sent — emit the masked byte.
    Escape,
    /// Emit the reply-end marker.
    End,
    /// Everything queued to the wire; waiting for physical completion.
    Done,
}

/// What the transmit interrupt must do with the wire next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxAction {
    /// Assert the bus driver-enable line, then write the byte.
    EnableDriver(u8),
    /// Write the byte.
    Write(u8),
    /// Nothing left to send — mask the transmit-ready interrupt.
    Disable,
}

/// The link transmitter.
pub struct LinkTransmitter {
    state: TxState,
    buf: [u8; MAX_PAYLOAD],
    len: u8,
    cursor: u8,
}

impl LinkTransmitter {
    pub const fn new() -> Self {
        Self {
            state: TxState::Idle,
            buf: [0; MAX_PAYLOAD],
            len: 0,
            cursor: 0,
        }
    }

    /// True when no transmission is in flight.
    pub fn is_idle(&self) -> bool {
        self.state == TxState::Idle
    }

    /// Queue a reply for transmission.
    ///
    /// Returns `false` (and leaves the machine untouched) if a
    /// transmission is already in flight or the payload is oversized.
    /// On success the caller must re-enable the transmit-ready
    /// interrupt to start the drain.
    pub fn start(&mut self, payload: &[u8]) -> bool {
        if self.state != TxState::Idle || payload.len() > MAX_PAYLOAD {
            return false;
        }
        self.buf[..payload.len()].copy_from_slice(payload);
        self.len = payload.len() as u8;
        self.cursor = 0;
        self.state = TxState::Start;
        true
    }

    /// Transmit-ready event handler. Interrupt context.
    pub fn on_ready(&mut self) -> TxAction {
        match self.state {
            TxState::Idle | TxState::Done => TxAction::Disable,
            TxState::Start => {
                self.cursor = 0;
                self.state = if self.len == 0 {
                    TxState::End
                } else {
                    TxState::Payload
                };
                TxAction::EnableDriver(REPLY_START)
            }
            TxState::Payload => {
                let c = self.buf[usize::from(self.cursor)];
                if needs_escape(c) {
                    // Escape prefix first; the cursor stays put.
                    self.state = TxState::Escape;
                    TxAction::Write(ESCAPE)
                } else {
                    self.advance();
                    TxAction::Write(c)
                }
            }
            TxState::Escape => {
                let c = self.buf[usize::from(self.cursor)] ^ ESCAPE_MASK;
                self.state = TxState::Payload;
                self.advance();
                TxAction::Write(c)
            }
            TxState::End => {
                self.state = TxState::Done;
                TxAction::Write(REPLY_END)
            }
        }
    }

    /// Physical transmit-complete event handler. Interrupt context.
    ///
    /// Returns `true` when the last byte has left the wire and the bus
    /// driver-enable line must be released.
    pub fn on_tx_complete(&mut self) -> bool {
        if self.state == TxState::Done {
            self.state = TxState::Idle;
            self.len = 0;
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        self.cursor += 1;
        if self.cursor >= self.len {
            self.state = TxState::End;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drain the transmitter the way the interrupt glue would, returning
    /// the wire bytes and whether the driver-enable was released.
    fn drain(tx: &mut LinkTransmitter) -> (Vec<u8>, bool) {
        let mut wire = Vec::new();
        loop {
            match tx.on_ready() {
                TxAction::EnableDriver(c) | TxAction::Write(c) => wire.push(c),
                TxAction::Disable => break,
            }
        }
        let released = tx.on_tx_complete();
        (wire, released)
    }

    #[test]
    fn plain_payload_on_the_wire() {
        let mut tx = LinkTransmitter::new();
        assert!(tx.start(b"abc"));
        let (wire, released) = drain(&mut tx);
        assert_eq!(wire, [REPLY_START, b'a', b'b', b'c', REPLY_END]);
        assert!(released);
        assert!(tx.is_idle());
    }

    #[test]
    fn empty_reply_is_start_end_only() {
        let mut tx = LinkTransmitter::new();
        assert!(tx.start(b""));
        let (wire, released) = drain(&mut tx);
        assert_eq!(wire, [REPLY_START, REPLY_END]);
        assert!(released);
    }

    #[test]
    fn low_bytes_are_escaped_without_advancing_early() {
        let mut tx = LinkTransmitter::new();
        assert!(tx.start(&[0x03, b'x', 0x1B]));
        let (wire, _) = drain(&mut tx);
        assert_eq!(
            wire,
            [REPLY_START, ESCAPE, 0x23, b'x', ESCAPE, 0x3B, REPLY_END]
        );
    }

    #[test]
    fn first_action_asserts_driver_enable() {
        let mut tx = LinkTransmitter::new();
        assert!(tx.start(b"a"));
        assert_eq!(tx.on_ready(), TxAction::EnableDriver(REPLY_START));
        assert_eq!(tx.on_ready(), TxAction::Write(b'a'));
    }

    #[test]
    fn completion_before_done_keeps_driver_enabled() {
        let mut tx = LinkTransmitter::new();
        assert!(tx.start(b"ab"));
        let _ = tx.on_ready(); // REPLY_START
        // A byte finished shifting out, but the frame is not done.
        assert!(!tx.on_tx_complete());
        assert!(!tx.is_idle());
    }

    #[test]
    fn start_while_busy_is_refused() {
        let mut tx = LinkTransmitter::new();
        assert!(tx.start(b"first"));
        assert!(!tx.start(b"second"));
        let (wire, _) = drain(&mut tx);
        assert_eq!(wire, [REPLY_START, b'f', b'i', b'r', b's', b't', REPLY_END]);
    }

    #[test]
    fn oversized_payload_is_refused() {
        let mut tx = LinkTransmitter::new();
        assert!(!tx.start(&[0u8; MAX_PAYLOAD + 1]));
        assert!(tx.is_idle());
    }

    #[test]
    fn spurious_ready_while_idle_disables() {
        let mut tx = LinkTransmitter::new();
        assert_eq!(tx.on_ready(), TxAction::Disable);
    }

    #[test]
    fn transmitter_is_reusable_after_completion() {
        let mut tx = LinkTransmitter::new();
        assert!(tx.start(b"one"));
        let _ = drain(&mut tx);
        assert!(tx.start(b"two"));
        let (wire, _) = drain(&mut tx);
        assert_eq!(wire, [REPLY_START, b't', b'w', b'o', REPLY_END]);
    }
}

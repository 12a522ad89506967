//! Byte-at-a-time receive state machine.
//!
//! Invoked once per received byte, from the receive interrupt context.
//! The mainline never sees these states — it only polls the ready latch.
//!
//! ```text
//!                  +-------+
//!                  |       |
//!                  v       | data (ignored)
//!        SkipReply --------+
//!         |      ^
//!         | R-END| R-START
//!         v      |
//!        Idle  <--------------------+<------------------+
//!         |                         |     +-----+       |
//!         | F-START           F-END |     |     |       |
//!         v                         |     v     | data  |
//!       Address  ------>  Payload --+-----+ (store)     |
//!         |       == addr                                |
//!         |                                        F-END |
//!         +--------------> SkipPayload ------------------+
//!               != addr        |   ^
//!                              |   | data (ignored)
//!                              +---+
//! ```
//!
//! Control bytes override any state, including a pending escape, so a
//! node that joins the bus mid-frame locks on at the next frame boundary.
//!
//! Loss is silent everywhere: address mismatch, payload overflow, a
//! garbled frame, or a frame arriving while the previous message is
//! still unconsumed all resolve to "drop and resynchronize". The bus
//! master re-polls; nothing is reported.

use super::frame::{
    ESCAPE, ESCAPE_MASK, FRAME_END, FRAME_START, MAX_PAYLOAD, Payload, REPLY_END, REPLY_START,
};

/// Receive-side framing states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    /// Between frames.
    Idle,
    /// Frame start seen, next data byte is the target address.
    Address,
    /// Frame is addressed to us — storing payload bytes.
    Payload,
    /// Frame is addressed to another node — discarding until frame end.
    SkipPayload,
    /// Another node's reply is on the bus — discarding until reply end.
    SkipReply,
}

/// The link receiver.
///
/// Owned by the receive interrupt context. The mainline may only call
/// [`poll`](Self::poll) and [`ack`](Self::ack), and only under a critical
/// section (see [`IsrCell`](crate::sync::IsrCell)).
pub struct LinkReceiver {
    state: RxState,
    escape: bool,
    /// Live copy of the node bus address (updated on address change).
    address: u8,
    buf: [u8; MAX_PAYLOAD],
    len: u8,
    /// Busy latch: set when a complete message awaits the mainline.
    /// While set, the buffer is immutable and new addressed frames are
    /// dropped.
    ready: bool,
}

impl LinkReceiver {
    pub const fn new(address: u8) -> Self {
        Self {
            state: RxState::Idle,
            escape: false,
            address,
            buf: [0; MAX_PAYLOAD],
            len: 0,
            ready: false,
        }
    }

    /// The bus address this receiver captures frames for.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Retarget the receiver after an address-change command.
    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    /// Byte-received event handler. Interrupt context.
    pub fn on_byte(&mut self, c: u8) {
        match c {
            FRAME_START => {
                // Mid-frame start is a master-side error; just restart.
                self.state = RxState::Address;
                self.escape = false;
            }
            FRAME_END => {
                if self.state == RxState::Payload {
                    self.ready = true;
                }
                self.state = RxState::Idle;
                self.escape = false;
            }
            REPLY_START => {
                self.state = RxState::SkipReply;
                self.escape = false;
            }
            REPLY_END => {
                self.state = RxState::Idle;
                self.escape = false;
            }
            ESCAPE => {
                self.escape = true;
            }
            mut data => {
                if self.escape {
                    data ^= ESCAPE_MASK;
                    self.escape = false;
                }
                match self.state {
                    RxState::Address => {
                        if data == self.address && !self.ready {
                            self.state = RxState::Payload;
                            self.len = 0;
                        } else {
                            // Someone else's frame, or we are still busy.
                            self.state = RxState::SkipPayload;
                        }
                    }
                    RxState::Payload => {
                        if usize::from(self.len) >= MAX_PAYLOAD {
                            // Overflow: discard the whole frame.
                            self.state = RxState::Idle;
                        } else {
                            self.buf[usize::from(self.len)] = data;
                            self.len += 1;
                        }
                    }
                    RxState::SkipPayload | RxState::SkipReply => {}
                    RxState::Idle => {
                        // Data with no frame open — noise, stay idle.
                    }
                }
            }
        }
    }

    /// Copy out the pending message, if any. Leaves the busy latch set —
    /// the caller must [`ack`](Self::ack) exactly once after handling.
    /// Mainline context, under a critical section.
    pub fn poll(&self) -> Option<Payload> {
        if !self.ready {
            return None;
        }
        let mut msg = Payload::new();
        let _ = msg.extend_from_slice(&self.buf[..usize::from(self.len)]);
        Some(msg)
    }

    /// Release the receive buffer and re-arm reception.
    /// Mainline context, under a critical section.
    pub fn ack(&mut self) {
        self.ready = false;
    }

    /// Whether a message is waiting for the mainline.
    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

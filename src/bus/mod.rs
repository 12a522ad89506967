//! Multi-drop link layer.
//!
//! One master polls many nodes over a shared half-duplex RS-485 pair.
//! Requests carry a node address; replies do not — the frame type alone
//! distinguishes them, and reply timing is collision-free because a node
//! only ever transmits in answer to its own address.
//!
//! The layer is split into a pure framing codec ([`frame`]), a per-byte
//! receive machine ([`receiver`]) and a per-byte transmit machine
//! ([`transmitter`]). Both machines are event handlers fed by the serial
//! interrupt glue; the same code runs against synthetic byte sequences
//! in the test suites.
//!
//! Delivery is fire-and-forget. There are no timeouts, retries or error
//! reports at this layer: whatever cannot be received correctly is
//! dropped, and the receiver relocks on the next control byte.

pub mod frame;
pub mod receiver;
pub mod transmitter;

pub use frame::Payload;
pub use receiver::LinkReceiver;
pub use transmitter::{LinkTransmitter, TxAction};

/// Both halves of the link, shared between the serial interrupts and
/// the mainline dispatcher through an
/// [`IsrCell`](crate::sync::IsrCell).
pub struct Link {
    pub rx: LinkReceiver,
    pub tx: LinkTransmitter,
}

impl Link {
    pub const fn new(address: u8) -> Self {
        Self {
            rx: LinkReceiver::new(address),
            tx: LinkTransmitter::new(),
        }
    }
}

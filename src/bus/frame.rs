//! Wire framing and escape codec.
//!
//! Frame format on the half-duplex bus:
//! ```text
//! ┌────────────┬─────────┬──────────────────┬───────────┐
//! │ FRAME_START│ address │ payload (0–16 B) │ FRAME_END │   request
//! └────────────┴─────────┴──────────────────┴───────────┘
//! ┌────────────┬──────────────────┬───────────┐
//! │ REPLY_START│ payload (0–16 B) │ REPLY_END │             reply
//! └────────────┴──────────────────┴───────────┘
//! ```
//!
//! Any address or payload byte below [`ESCAPE_THRESHOLD`] is transmitted
//! as `ESCAPE, byte ^ ESCAPE_MASK` so that control symbols can never
//! appear inside a frame body. Control symbols themselves are never
//! escaped and always take effect immediately — a receiver powered on
//! mid-frame resynchronizes on the next control symbol with no external
//! recovery action.

/// Marks the start of an addressed request.
pub const FRAME_START: u8 = 0x01;
/// Marks the start of an unaddressed reply.
pub const REPLY_START: u8 = 0x02;
/// Terminates a reply.
pub const REPLY_END: u8 = 0x03;
/// Terminates an addressed request.
pub const FRAME_END: u8 = 0x04;
/// Escape prefix for low-value data bytes.
pub const ESCAPE: u8 = 0x1B;

/// Every data byte below this value must be escaped.
pub const ESCAPE_THRESHOLD: u8 = 0x20;
/// XOR mask applied to the byte following an [`ESCAPE`].
pub const ESCAPE_MASK: u8 = 0x20;

/// Maximum raw payload length per frame.
pub const MAX_PAYLOAD: usize = 16;

/// Worst-case on-wire size of one frame: start marker, escaped address,
/// fully-escaped payload, end marker.
pub const MAX_WIRE: usize = 2 * MAX_PAYLOAD + 4;

/// A decoded frame payload.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD>;

/// Raw bytes of one encoded frame.
pub type Wire = heapless::Vec<u8, MAX_WIRE>;

/// True for bytes that must be sent in escaped form.
#[inline]
pub fn needs_escape(c: u8) -> bool {
    c < ESCAPE_THRESHOLD
}

fn push_escaped(out: &mut Wire, c: u8) {
    if needs_escape(c) {
        let _ = out.push(ESCAPE);
        let _ = out.push(c ^ ESCAPE_MASK);
    } else {
        let _ = out.push(c);
    }
}

/// Encode an addressed request frame.
///
/// Returns `None` when the payload exceeds [`MAX_PAYLOAD`]. Used by
/// master-side tooling and the test suites; the node itself only ever
/// decodes requests.
pub fn encode_request(address: u8, payload: &[u8]) -> Option<Wire> {
    if payload.len() > MAX_PAYLOAD {
        return None;
    }
    let mut out = Wire::new();
    let _ = out.push(FRAME_START);
    push_escaped(&mut out, address);
    for &c in payload {
        push_escaped(&mut out, c);
    }
    let _ = out.push(FRAME_END);
    Some(out)
}

/// Encode a reply frame.
pub fn encode_reply(payload: &[u8]) -> Option<Wire> {
    if payload.len() > MAX_PAYLOAD {
        return None;
    }
    let mut out = Wire::new();
    let _ = out.push(REPLY_START);
    for &c in payload {
        push_escaped(&mut out, c);
    }
    let _ = out.push(REPLY_END);
    Some(out)
}

/// Streaming reply decoder (master side of the bus).
///
/// Accumulates bytes until a complete `REPLY_START … REPLY_END` frame has
/// been seen, un-escaping as it goes. Garbage between frames is skipped;
/// an oversized reply is discarded and the decoder resynchronizes on the
/// next `REPLY_START`.
pub struct ReplyDecoder {
    in_reply: bool,
    escape: bool,
    buf: Payload,
}

impl ReplyDecoder {
    pub fn new() -> Self {
        Self {
            in_reply: false,
            escape: false,
            buf: Payload::new(),
        }
    }

    /// Feed one byte.
    ///
    /// Returns `Some(payload)` when this byte completed a reply frame.
    pub fn feed(&mut self, c: u8) -> Option<Payload> {
        match c {
            REPLY_START => {
                self.in_reply = true;
                self.escape = false;
                self.buf.clear();
                None
            }
            REPLY_END => {
                self.escape = false;
                if self.in_reply {
                    self.in_reply = false;
                    Some(core::mem::take(&mut self.buf))
                } else {
                    None
                }
            }
            ESCAPE => {
                self.escape = true;
                None
            }
            mut data => {
                if self.escape {
                    data ^= ESCAPE_MASK;
                    self.escape = false;
                }
                if self.in_reply && self.buf.push(data).is_err() {
                    // Oversized reply — drop it, wait for the next frame.
                    self.in_reply = false;
                    self.buf.clear();
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Payload> {
        let mut dec = ReplyDecoder::new();
        bytes.iter().filter_map(|&c| dec.feed(c)).collect()
    }

    #[test]
    fn plain_payload_is_not_escaped() {
        let wire = encode_reply(b"abc").unwrap();
        assert_eq!(&wire[..], &[REPLY_START, b'a', b'b', b'c', REPLY_END]);
    }

    #[test]
    fn low_bytes_are_escaped_with_xor() {
        let wire = encode_reply(&[0x01]).unwrap();
        assert_eq!(&wire[..], &[REPLY_START, ESCAPE, 0x21, REPLY_END]);
    }

    #[test]
    fn every_low_byte_escapes_to_exactly_two_bytes() {
        for b in 0x00..ESCAPE_THRESHOLD {
            let wire = encode_reply(&[b]).unwrap();
            assert_eq!(wire.len(), 4, "byte {b:#04x}");
            assert_eq!(wire[1], ESCAPE);
            assert_eq!(wire[2], b ^ ESCAPE_MASK);
        }
        for b in ESCAPE_THRESHOLD..=0xFF {
            let wire = encode_reply(&[b]).unwrap();
            assert_eq!(&wire[..], &[REPLY_START, b, REPLY_END], "byte {b:#04x}");
        }
    }

    #[test]
    fn request_escapes_address_too() {
        let wire = encode_request(0x05, b"x").unwrap();
        assert_eq!(&wire[..], &[FRAME_START, ESCAPE, 0x25, b'x', FRAME_END]);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        assert!(encode_reply(&[0u8; MAX_PAYLOAD + 1]).is_none());
        assert!(encode_request(0x40, &[0u8; MAX_PAYLOAD + 1]).is_none());
    }

    #[test]
    fn reply_round_trip() {
        let payload = [0x00, 0x1F, 0x20, 0xFF, b'G', 0x1B, 0x02];
        let wire = encode_reply(&payload).unwrap();
        let got = decode_all(&wire);
        assert_eq!(got.len(), 1);
        assert_eq!(&got[0][..], &payload);
    }

    #[test]
    fn empty_reply_round_trip() {
        let wire = encode_reply(&[]).unwrap();
        assert_eq!(&wire[..], &[REPLY_START, REPLY_END]);
        let got = decode_all(&wire);
        assert_eq!(got.len(), 1);
        assert!(got[0].is_empty());
    }

    #[test]
    fn decoder_skips_junk_between_frames() {
        let mut bytes = vec![0xAA, 0x55, b'z'];
        bytes.extend_from_slice(&encode_reply(b"ok").unwrap());
        let got = decode_all(&bytes);
        assert_eq!(got.len(), 1);
        assert_eq!(&got[0][..], b"ok");
    }

    #[test]
    fn decoder_resyncs_after_truncated_frame() {
        let mut bytes = vec![REPLY_START, b'p', b'a', b'r'];
        // No REPLY_END — next frame must still decode.
        bytes.extend_from_slice(&encode_reply(b"good").unwrap());
        let got = decode_all(&bytes);
        assert_eq!(got.len(), 1);
        assert_eq!(&got[0][..], b"good");
    }

    #[test]
    fn stray_reply_end_yields_nothing() {
        assert!(decode_all(&[REPLY_END, REPLY_END]).is_empty());
    }
}

//! Fuzz target: `ReplyDecoder::feed`
//!
//! The master-side streaming decoder must never panic and never yield a
//! payload longer than the protocol maximum, whatever arrives on the
//! wire.
//!
//! cargo fuzz run fuzz_reply_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use stepnode::bus::frame::{MAX_PAYLOAD, ReplyDecoder};

fuzz_target!(|data: &[u8]| {
    let mut dec = ReplyDecoder::new();
    for &c in data {
        if let Some(payload) = dec.feed(c) {
            assert!(payload.len() <= MAX_PAYLOAD);
        }
    }
});

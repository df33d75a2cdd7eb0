//! Random byte streams through the bounded message decoder.
//!
//! The decoder must never accumulate past its bound, never panic, and must
//! recover after every overrun: a terminator always completes the next
//! message cleanly.

#![no_main]

use latchkey_proto::{ALT_TERMINATOR, END_MARKER, MAX_PAYLOAD, MessageDecoder, ProtocolError};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = MessageDecoder::new();

    for &byte in data {
        match decoder.push(byte) {
            Ok(Some(payload)) => {
                // INVARIANT 1: a completed payload is within bound and
                // contains no terminator byte.
                assert!(payload.len() <= MAX_PAYLOAD);
                assert!(payload.iter().all(|&b| b != END_MARKER && b != ALT_TERMINATOR));
                assert!(decoder.is_empty(), "decoder must reset after completion");
            },
            Ok(None) => {
                // INVARIANT 2: accumulation never exceeds the bound.
                assert!(decoder.len() <= MAX_PAYLOAD);
            },
            Err(err) => {
                // INVARIANT 3: the only decode error is the overrun, and it
                // resets the decoder.
                assert_eq!(err, ProtocolError::FramingOverrun { limit: MAX_PAYLOAD });
                assert!(decoder.is_empty(), "decoder must reset after overrun");
            },
        }
    }

    // INVARIANT 4: whatever the stream did, the decoder is usable again.
    let _ = decoder.push(b'0');
    let completed = decoder.push(END_MARKER);
    assert!(matches!(completed, Ok(Some(_))));
});

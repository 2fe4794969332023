//! Fuzz target for ControlFrame::decode
//!
//! Every inbound text frame from a client goes through this decoder.
//!
//! # Invariants
//!
//! - Decoding NEVER panics, whatever the bytes
//! - A decoded join or leave always names a non-empty chat

#![no_main]

use chatline_core::ControlFrame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match ControlFrame::decode(data) {
        Ok(ControlFrame::JoinChat { chat_id } | ControlFrame::LeaveChat { chat_id }) => {
            assert!(!chat_id.as_str().is_empty(), "decoded control frame with empty chat id");
        },
        Ok(ControlFrame::Unknown) | Err(_) => {},
    }
});

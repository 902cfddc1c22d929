//! Fuzz target for the whole-session decryption pipeline
//!
//! Drives decrypt_secure_frame with arbitrary records, offsets and claimed
//! lengths. Whatever the input, the session must return a structured result
//! and stay usable for the next frame.

#![no_main]

use libfuzzer_sys::fuzz_target;
use meshsec_core::{KeyOrigin, NoHints, PanId, SecurityLevel, SecuritySession};

fuzz_target!(|input: (Vec<u8>, u8, u16, [u8; 16])| {
    let (frame, offset, reported_len, key) = input;

    let mut session = SecuritySession::new(SecurityLevel::EncMic32);
    session.register_observed_key(PanId(0x0001), key, KeyOrigin::Frame(1));

    let _ = session.decrypt_secure_frame(
        &frame,
        usize::from(offset),
        usize::from(reported_len),
        PanId(0x0001),
        &NoHints,
    );
    // A second call on the same session must also be safe.
    let _ = session.decrypt_secure_frame(&frame, 0, frame.len(), PanId(0x0001), &NoHints);
});

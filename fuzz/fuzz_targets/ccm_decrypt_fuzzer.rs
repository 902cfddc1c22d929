//! Fuzz target for the CCM* reverse transform
//!
//! Arbitrary ciphertext, associated data and MIC lengths must never panic or
//! over-read; wrong MICs must come back as errors, not garbage plaintext.

#![no_main]

use libfuzzer_sys::fuzz_target;
use meshsec_crypto::ccm_star_decrypt;

fuzz_target!(|input: (u8, [u8; 16], [u8; 13], Vec<u8>, Vec<u8>)| {
    let (mic_selector, key, nonce, aad, ciphertext) = input;
    let mic_len = [0usize, 4, 8, 16][usize::from(mic_selector) % 4];

    if let Ok(plaintext) = ccm_star_decrypt(&key, &nonce, &aad, &ciphertext, mic_len) {
        assert_eq!(plaintext.len(), ciphertext.len() - mic_len);
    }
});

//! CCM* authenticated encryption.
//!
//! The reverse (and forward) CCM* transformation with the mesh protocol's
//! framing: a 13-byte nonce, a 2-byte block counter, and a MIC of 0, 4, 8 or
//! 16 bytes. A zero-length MIC is a defined mode, not an error; the mode
//! degenerates to plain CTR encryption.
//!
//! The CTR pass and the authentication pass are assembled manually from the
//! block primitive. Authentication is CBC-MAC over a transformed input
//! (`B0 ‖ L(a) ‖ a ‖ padding ‖ m ‖ padding`), which no packaged CBC-MAC
//! accepts directly, so the fold runs on raw ECB blocks. Note that the MIC
//! is computed over the *plaintext*; on decryption the payload must be
//! deciphered before the tag can be checked.

use crate::block::{BLOCK_SIZE, BlockCipher, KEY_SIZE, NONCE_SIZE};
use crate::error::CryptoError;

/// Flag bits for the 2-byte length field (L' = L - 1, L = 2).
const FLAG_L: u8 = 0x01;

/// Flag bit set in B0 when associated data is present.
const FLAG_ADATA: u8 = 0x40;

/// Decrypt and authenticate a CCM* frame.
///
/// `ciphertext_with_mic` carries the encrypted payload followed by the
/// encrypted MIC, as on the wire. `associated_data` is covered by the MIC
/// but not encrypted. Returns the plaintext payload.
///
/// With `mic_len == 0` no authentication is performed and the call succeeds
/// unconditionally; the first counter block is still consumed so the payload
/// framing matches the authenticated modes.
///
/// # Errors
///
/// - `InvalidMicLength` if `mic_len` is not 0, 4, 8 or 16
/// - `FrameTooLarge` if the associated data would overflow the block counter
/// - `TruncatedCiphertext` if the buffer cannot hold the MIC
/// - `AuthFailure` if the computed tag does not match the received MIC
pub fn ccm_star_decrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    associated_data: &[u8],
    ciphertext_with_mic: &[u8],
    mic_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    validate(associated_data, mic_len)?;
    let payload_len = ciphertext_with_mic.len().checked_sub(mic_len).ok_or(
        CryptoError::TruncatedCiphertext { available: ciphertext_with_mic.len(), mic_len },
    )?;

    let cipher = BlockCipher::new(key);
    let mut counter = counter_block(nonce);

    // The MIC is deciphered first as one full block, whatever its length,
    // so the payload keystream starts at counter value 1.
    let mut mic = [0u8; BLOCK_SIZE];
    mic[..mic_len].copy_from_slice(&ciphertext_with_mic[payload_len..]);
    cipher.ctr_xor(&mut counter, &mut mic);

    let mut plaintext = ciphertext_with_mic[..payload_len].to_vec();
    cipher.ctr_xor(&mut counter, &mut plaintext);

    if mic_len == 0 {
        return Ok(plaintext);
    }

    let tag = compute_tag(&cipher, nonce, associated_data, &plaintext, mic_len);
    if tag[..mic_len] == mic[..mic_len] {
        Ok(plaintext)
    } else {
        Err(CryptoError::AuthFailure)
    }
}

/// Encrypt and authenticate a CCM* frame.
///
/// The inverse of [`ccm_star_decrypt`]: returns the encrypted payload with
/// the encrypted MIC appended.
///
/// # Errors
///
/// - `InvalidMicLength` if `mic_len` is not 0, 4, 8 or 16
/// - `FrameTooLarge` if the associated data would overflow the block counter
pub fn ccm_star_encrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    associated_data: &[u8],
    plaintext: &[u8],
    mic_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    validate(associated_data, mic_len)?;

    let cipher = BlockCipher::new(key);
    let mut counter = counter_block(nonce);

    let mut mic = [0u8; BLOCK_SIZE];
    if mic_len > 0 {
        let tag = compute_tag(&cipher, nonce, associated_data, plaintext, mic_len);
        mic[..mic_len].copy_from_slice(&tag[..mic_len]);
    }
    cipher.ctr_xor(&mut counter, &mut mic);

    let mut out = plaintext.to_vec();
    cipher.ctr_xor(&mut counter, &mut out);
    out.extend_from_slice(&mic[..mic_len]);
    Ok(out)
}

fn validate(associated_data: &[u8], mic_len: usize) -> Result<(), CryptoError> {
    if !matches!(mic_len, 0 | 4 | 8 | 16) {
        return Err(CryptoError::InvalidMicLength(mic_len));
    }
    let blocks = 1 + associated_data.len() / BLOCK_SIZE;
    if blocks > 1 << 16 {
        return Err(CryptoError::FrameTooLarge { blocks });
    }
    Ok(())
}

/// The A0 counter block: flags ‖ nonce ‖ 2-byte counter starting at 0.
fn counter_block(nonce: &[u8; NONCE_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    block[0] = FLAG_L;
    block[1..=NONCE_SIZE].copy_from_slice(nonce);
    block
}

/// CBC-MAC over the CCM* authentication input, truncated by the caller.
///
/// `B0 = flags ‖ nonce ‖ l(m)`; the fold input is `L(a) ‖ a` zero-padded to
/// the block boundary, then `m` zero-padded. `L(a)` is empty for no
/// associated data, else the 2-byte big-endian length (this protocol's
/// frames never reach the longer encodings).
fn compute_tag(
    cipher: &BlockCipher,
    nonce: &[u8; NONCE_SIZE],
    associated_data: &[u8],
    payload: &[u8],
    mic_len: usize,
) -> [u8; BLOCK_SIZE] {
    let mut state = [0u8; BLOCK_SIZE];
    state[0] = FLAG_L | (((mic_len as u8 - 2) / 2) << 3);
    if !associated_data.is_empty() {
        state[0] |= FLAG_ADATA;
    }
    state[1..=NONCE_SIZE].copy_from_slice(nonce);
    state[BLOCK_SIZE - 2..].copy_from_slice(&((payload.len() & 0xffff) as u16).to_be_bytes());
    cipher.encrypt_block(&mut state);

    let mut auth =
        Vec::with_capacity(2 + associated_data.len() + payload.len() + 2 * BLOCK_SIZE);
    if !associated_data.is_empty() {
        auth.extend_from_slice(&((associated_data.len() & 0xffff) as u16).to_be_bytes());
        auth.extend_from_slice(associated_data);
        pad_to_block(&mut auth);
    }
    auth.extend_from_slice(payload);
    pad_to_block(&mut auth);
    if auth.is_empty() {
        // Degenerate empty-input case still folds one zero block.
        auth.resize(BLOCK_SIZE, 0);
    }

    for block in auth.chunks_exact(BLOCK_SIZE) {
        for (state_byte, auth_byte) in state.iter_mut().zip(block.iter()) {
            *state_byte ^= auth_byte;
        }
        cipher.encrypt_block(&mut state);
    }
    state
}

fn pad_to_block(buf: &mut Vec<u8>) {
    let rem = buf.len() % BLOCK_SIZE;
    if rem != 0 {
        buf.resize(buf.len() + BLOCK_SIZE - rem, 0);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const KEY: [u8; KEY_SIZE] = [0u8; KEY_SIZE];

    fn test_nonce() -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        for (i, byte) in nonce.iter_mut().enumerate() {
            *byte = i as u8;
        }
        nonce
    }

    #[test]
    fn roundtrip_all_mic_lengths() {
        let plaintext = b"\xDE\xAD\xBE\xEF";
        let aad = b"header bytes";

        for mic_len in [0usize, 4, 8, 16] {
            let sealed = ccm_star_encrypt(&KEY, &test_nonce(), aad, plaintext, mic_len)
                .unwrap();
            assert_eq!(sealed.len(), plaintext.len() + mic_len);

            let opened = ccm_star_decrypt(&KEY, &test_nonce(), aad, &sealed, mic_len)
                .unwrap();
            assert_eq!(opened, plaintext);
        }
    }

    #[test]
    fn output_is_deterministic() {
        let first = ccm_star_encrypt(&KEY, &test_nonce(), &[], b"\xDE\xAD\xBE\xEF", 4);
        let second = ccm_star_encrypt(&KEY, &test_nonce(), &[], b"\xDE\xAD\xBE\xEF", 4);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_payload_mic_only() {
        let aad = b"cleartext frame contents";
        let sealed = ccm_star_encrypt(&KEY, &test_nonce(), aad, &[], 8)
            .unwrap();
        assert_eq!(sealed.len(), 8);

        let opened = ccm_star_decrypt(&KEY, &test_nonce(), aad, &sealed, 8)
            .unwrap();
        assert!(opened.is_empty());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut sealed = ccm_star_encrypt(&KEY, &test_nonce(), b"aad", b"payload", 4)
            .unwrap();
        sealed[0] ^= 0x01;
        assert_eq!(
            ccm_star_decrypt(&KEY, &test_nonce(), b"aad", &sealed, 4),
            Err(CryptoError::AuthFailure)
        );
    }

    #[test]
    fn tampered_mic_fails() {
        let mut sealed = ccm_star_encrypt(&KEY, &test_nonce(), b"aad", b"payload", 4)
            .unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x80;
        assert_eq!(
            ccm_star_decrypt(&KEY, &test_nonce(), b"aad", &sealed, 4),
            Err(CryptoError::AuthFailure)
        );
    }

    #[test]
    fn tampered_associated_data_fails() {
        let sealed = ccm_star_encrypt(&KEY, &test_nonce(), b"aad", b"payload", 4)
            .unwrap();
        assert_eq!(
            ccm_star_decrypt(&KEY, &test_nonce(), b"aae", &sealed, 4),
            Err(CryptoError::AuthFailure)
        );
    }

    #[test]
    fn tampered_nonce_fails() {
        let sealed = ccm_star_encrypt(&KEY, &test_nonce(), b"aad", b"payload", 4)
            .unwrap();
        let mut nonce = test_nonce();
        nonce[12] ^= 0x04;
        assert_eq!(
            ccm_star_decrypt(&KEY, &nonce, b"aad", &sealed, 4),
            Err(CryptoError::AuthFailure)
        );
    }

    #[test]
    fn unauthenticated_mode_accepts_anything() {
        // mic_len 0 is plain CTR; any buffer "decrypts".
        let opened = ccm_star_decrypt(&KEY, &test_nonce(), &[], b"\x01\x02\x03", 0)
            .unwrap();
        assert_eq!(opened.len(), 3);
    }

    #[test]
    fn mic_region_uses_the_first_counter_block() {
        // With mic_len 0 the payload must still start at counter value 1:
        // the ciphertext of (payload) with no MIC equals the tail of the
        // ciphertext of (payload with a MIC) for the same nonce.
        let with_mic = ccm_star_encrypt(&KEY, &test_nonce(), &[], b"same payload", 4)
            .unwrap();
        let without_mic = ccm_star_encrypt(&KEY, &test_nonce(), &[], b"same payload", 0)
            .unwrap();
        assert_eq!(with_mic[..b"same payload".len()], without_mic[..]);
    }

    #[test]
    fn rejects_invalid_mic_length() {
        assert_eq!(
            ccm_star_decrypt(&KEY, &test_nonce(), &[], &[0; 8], 6),
            Err(CryptoError::InvalidMicLength(6))
        );
    }

    #[test]
    fn rejects_truncated_ciphertext() {
        assert_eq!(
            ccm_star_decrypt(&KEY, &test_nonce(), &[], &[0; 3], 4),
            Err(CryptoError::TruncatedCiphertext { available: 3, mic_len: 4 })
        );
    }

    #[test]
    fn rejects_oversized_associated_data() {
        let aad = vec![0u8; (1 << 16) * BLOCK_SIZE];
        assert_eq!(
            ccm_star_decrypt(&KEY, &test_nonce(), &aad, &[0; 4], 4),
            Err(CryptoError::FrameTooLarge { blocks: (1 << 16) + 1 })
        );
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            key in prop::array::uniform16(any::<u8>()),
            nonce in prop::array::uniform13(any::<u8>()),
            aad in prop::collection::vec(any::<u8>(), 0..48),
            plaintext in prop::collection::vec(any::<u8>(), 0..64),
            mic_index in 0usize..4,
        ) {
            let mic_len = [0usize, 4, 8, 16][mic_index];
            let sealed = ccm_star_encrypt(&key, &nonce, &aad, &plaintext, mic_len)
                .map_err(|_| TestCaseError::fail("encrypt failed"))?;
            prop_assert_eq!(sealed.len(), plaintext.len() + mic_len);

            let opened = ccm_star_decrypt(&key, &nonce, &aad, &sealed, mic_len)
                .map_err(|_| TestCaseError::fail("decrypt failed"))?;
            prop_assert_eq!(opened, plaintext);
        }

        #[test]
        fn prop_bit_flips_are_detected(
            plaintext in prop::collection::vec(any::<u8>(), 1..32),
            flip_byte in 0usize..32,
            flip_bit in 0u8..8,
        ) {
            let sealed = ccm_star_encrypt(&KEY, &test_nonce(), b"hdr", &plaintext, 8)
                .map_err(|_| TestCaseError::fail("encrypt failed"))?;
            let mut tampered = sealed.clone();
            let index = flip_byte % tampered.len();
            tampered[index] ^= 1 << flip_bit;

            prop_assert_eq!(
                ccm_star_decrypt(&KEY, &test_nonce(), b"hdr", &tampered, 8),
                Err(CryptoError::AuthFailure)
            );
        }
    }
}

//! Matyas-Meyer-Oseas hash and the keyed hash built on it.
//!
//! The mesh protocol specifies no standalone hash primitive; where one is
//! needed it builds a Matyas-Meyer-Oseas construction from the AES-128 block
//! cipher. The keyed variant (FIPS-198 HMAC shape with the MMO hash in place
//! of a conventional hash) derives the key-transport and key-load sub-keys
//! from a link key.

use zeroize::Zeroize;

use crate::block::{BLOCK_SIZE, BlockCipher, KEY_SIZE};

/// Derivation byte for the key-transport sub-key.
pub const KEY_TRANSPORT_INPUT: u8 = 0x00;

/// Derivation byte for the key-load sub-key.
pub const KEY_LOAD_INPUT: u8 = 0x02;

const INNER_PAD: u8 = 0x36;
const OUTER_PAD: u8 = 0x5c;

/// Matyas-Meyer-Oseas hash over AES-128.
///
/// The running state doubles as the cipher key: each padded input block is
/// encrypted under the previous state and XOR'd back into the output,
/// starting from the all-zero state. Input may be any length; the output is
/// always one block.
///
/// Padding appends the bit `1` (as `0x80`, since input is whole octets),
/// then zeros until two bytes remain in the final block, which carry the
/// big-endian bit length of the input. An input ending within two bytes of
/// a block boundary spills the padding into one extra block.
#[must_use]
pub fn mmo_hash(input: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut state = [0u8; BLOCK_SIZE];

    let mut blocks = input.chunks_exact(BLOCK_SIZE);
    for block in &mut blocks {
        let mut full = [0u8; BLOCK_SIZE];
        full.copy_from_slice(block);
        absorb(&mut state, &full);
    }

    let remainder = blocks.remainder();
    let bit_len = (input.len().wrapping_mul(8) & 0xffff) as u16;

    let mut tail = [0u8; BLOCK_SIZE];
    tail[..remainder.len()].copy_from_slice(remainder);
    tail[remainder.len()] = 0x80;

    if remainder.len() > BLOCK_SIZE - 3 {
        // No room for the length field; it moves to an extra block.
        absorb(&mut state, &tail);
        tail = [0u8; BLOCK_SIZE];
    }
    tail[BLOCK_SIZE - 2..].copy_from_slice(&bit_len.to_be_bytes());
    absorb(&mut state, &tail);

    state
}

/// Keyed hash for sub-key derivation.
///
/// Computes `H((key ^ opad) ‖ H((key ^ ipad) ‖ input))` with `H` the MMO
/// hash, ipad `0x36` and opad `0x5c`. The protocol only ever hashes a single
/// input byte: [`KEY_TRANSPORT_INPUT`] or [`KEY_LOAD_INPUT`].
#[must_use]
pub fn keyed_hash(key: &[u8; KEY_SIZE], input: u8) -> [u8; KEY_SIZE] {
    let mut inner = [0u8; BLOCK_SIZE + 1];
    for (byte, key_byte) in inner.iter_mut().zip(key.iter()) {
        *byte = key_byte ^ INNER_PAD;
    }
    inner[BLOCK_SIZE] = input;
    let inner_hash = mmo_hash(&inner);

    let mut outer = [0u8; 2 * BLOCK_SIZE];
    for (byte, key_byte) in outer.iter_mut().zip(key.iter()) {
        *byte = key_byte ^ OUTER_PAD;
    }
    outer[BLOCK_SIZE..].copy_from_slice(&inner_hash);
    let result = mmo_hash(&outer);

    inner.zeroize();
    outer.zeroize();
    result
}

/// Fold one block into the hash state: `state = E(state, block) ^ block`.
fn absorb(state: &mut [u8; BLOCK_SIZE], block: &[u8; BLOCK_SIZE]) {
    let cipher = BlockCipher::new(state);
    let mut out = *block;
    cipher.encrypt_block(&mut out);
    for ((state_byte, out_byte), block_byte) in state.iter_mut().zip(out.iter()).zip(block.iter()) {
        *state_byte = out_byte ^ block_byte;
    }
}

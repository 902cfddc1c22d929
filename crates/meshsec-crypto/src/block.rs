//! Raw AES-128 block primitive.
//!
//! Both CCM* and the MMO hash are assembled from single-block ECB
//! encryptions. This wrapper owns the key schedule for one key; constructing
//! it acquires the cipher and dropping it releases it, so there is no
//! open/set-key/close sequence to get wrong on early-return paths.

use aes::Aes128;
use cipher::{BlockEncrypt, KeyInit};

/// Symmetric key size in bytes (AES-128).
pub const KEY_SIZE: usize = 16;

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// CCM* nonce size in bytes (15 - L, with a 2-byte length field).
pub const NONCE_SIZE: usize = 13;

/// AES-128 keyed for one decryption attempt.
///
/// Exposes the two operations the security sublayer is built on: a raw ECB
/// single-block encryption and a CTR keystream XOR. Decryption of payload
/// data never uses the AES inverse cipher; CCM* runs the forward cipher in
/// both directions.
pub struct BlockCipher {
    cipher: Aes128,
}

impl BlockCipher {
    /// Schedule the given key.
    #[must_use]
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self { cipher: Aes128::new(key.into()) }
    }

    /// Encrypt one block in place (raw ECB).
    pub fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        self.cipher.encrypt_block(block.into());
    }

    /// XOR `data` with the CTR keystream seeded from `counter`.
    ///
    /// One keystream block is produced per 16-byte chunk of `data`; a final
    /// partial chunk consumes a whole block and discards the tail. The
    /// counter block is incremented as a 128-bit big-endian integer after
    /// each block and is left advanced, so consecutive calls continue the
    /// same keystream (the MIC region and the payload share one counter
    /// sequence).
    pub fn ctr_xor(&self, counter: &mut [u8; BLOCK_SIZE], data: &mut [u8]) {
        for chunk in data.chunks_mut(BLOCK_SIZE) {
            let mut keystream = *counter;
            self.encrypt_block(&mut keystream);
            for (byte, pad) in chunk.iter_mut().zip(keystream.iter()) {
                *byte ^= pad;
            }
            increment_be(counter);
        }
    }
}

/// Increment a counter block as a big-endian integer.
fn increment_be(counter: &mut [u8; BLOCK_SIZE]) {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// FIPS-197 appendix C.1 known-answer vector.
    #[test]
    fn aes128_known_answer() {
        let key: [u8; KEY_SIZE] = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ];
        let mut block: [u8; BLOCK_SIZE] = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        let expected: [u8; BLOCK_SIZE] = [
            0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
            0xc5, 0x5a,
        ];

        BlockCipher::new(&key).encrypt_block(&mut block);
        assert_eq!(block, expected);
    }

    #[test]
    fn ctr_xor_is_an_involution() {
        let cipher = BlockCipher::new(&[0x42; KEY_SIZE]);
        let original: Vec<u8> = (0..40).collect();
        let mut data = original.clone();

        let mut counter = [0u8; BLOCK_SIZE];
        cipher.ctr_xor(&mut counter, &mut data);
        assert_ne!(data, original);

        let mut counter = [0u8; BLOCK_SIZE];
        cipher.ctr_xor(&mut counter, &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn ctr_stream_continues_across_calls() {
        let cipher = BlockCipher::new(&[0x17; KEY_SIZE]);

        let mut whole = [0u8; 48];
        let mut counter = [0u8; BLOCK_SIZE];
        cipher.ctr_xor(&mut counter, &mut whole);

        let mut split = [0u8; 48];
        let mut counter = [0u8; BLOCK_SIZE];
        let (head, tail) = split.split_at_mut(BLOCK_SIZE);
        cipher.ctr_xor(&mut counter, head);
        cipher.ctr_xor(&mut counter, tail);

        assert_eq!(whole, split);
    }

    #[test]
    fn partial_trailing_chunk_advances_counter() {
        let cipher = BlockCipher::new(&[0x03; KEY_SIZE]);

        let mut counter = [0u8; BLOCK_SIZE];
        cipher.ctr_xor(&mut counter, &mut [0u8; 5]);

        let mut expected = [0u8; BLOCK_SIZE];
        expected[BLOCK_SIZE - 1] = 1;
        assert_eq!(counter, expected);
    }

    #[test]
    fn counter_increment_carries() {
        let mut counter = [0xff; BLOCK_SIZE];
        counter[0] = 0x00;
        increment_be(&mut counter);

        let mut expected = [0x00; BLOCK_SIZE];
        expected[0] = 0x01;
        assert_eq!(counter, expected);
    }
}

//! Error types for the cryptographic primitives.

use thiserror::Error;

/// Errors from the CCM* transform.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// MIC length is not one of the lengths the mode defines (0, 4, 8, 16)
    #[error("invalid MIC length: {0} bytes")]
    InvalidMicLength(usize),

    /// Associated data needs more blocks than the 2-byte counter can address
    #[error("associated data too large for the CCM* counter ({blocks} blocks)")]
    FrameTooLarge {
        /// Number of counter blocks the associated data would require
        blocks: usize,
    },

    /// Ciphertext is shorter than the MIC it claims to carry
    #[error("ciphertext truncated: {available} bytes available, MIC alone needs {mic_len}")]
    TruncatedCiphertext {
        /// Bytes available in the ciphertext buffer
        available: usize,
        /// Configured MIC length
        mic_len: usize,
    },

    /// Computed tag did not match the received MIC
    #[error("message integrity check failed")]
    AuthFailure,
}

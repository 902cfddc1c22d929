//! Error types for frame security processing.
//!
//! Every failure mode of a single frame's decryption attempt is a variant
//! here; no panic crosses the crate boundary. None of these are retryable:
//! the same input always yields the same outcome. The only state that varies
//! between passes is the key cache, which changes which key is tried first,
//! never the verdict.

use thiserror::Error;

use crate::config::KeyParseError;

/// Errors from parsing or decrypting one secured frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// Fewer bytes remain than the header's fixed and flagged fields require
    #[error("security header truncated: need {needed} bytes, {available} available")]
    HeaderTooShort {
        /// Bytes the header requires from its start
        needed: usize,
        /// Bytes actually available
        available: usize,
    },

    /// The extended source address was absent and no hint could resolve it
    #[error("extended source address unknown; cannot build the nonce")]
    UnknownSource,

    /// Associated data would overflow the CCM* block counter
    #[error("frame too large for the CCM* counter")]
    FrameTooLarge,

    /// Capture ends before the declared payload and MIC
    #[error("encrypted payload cut short: expected {expected} bytes, captured {available}")]
    TruncatedCiphertext {
        /// Bytes the payload and MIC claim
        expected: usize,
        /// Bytes actually captured
        available: usize,
    },

    /// No candidate key produced a verified decryption
    #[error("decryption failed: no key verified the frame ({tried} tried)")]
    AuthFailure {
        /// Number of candidate keys attempted
        tried: usize,
    },

    /// A configured key string could not be parsed
    #[error(transparent)]
    KeyParse(#[from] KeyParseError),
}

impl SecurityError {
    /// Returns true if the frame cannot even be displayed as opaque bytes.
    ///
    /// An authentication failure leaves a well-formed frame whose payload
    /// the caller can still show as ciphertext; the structural errors mean
    /// the byte layout itself could not be established.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::HeaderTooShort { .. }
            | Self::FrameTooLarge
            | Self::TruncatedCiphertext { .. }
            | Self::KeyParse(_) => true,

            Self::UnknownSource | Self::AuthFailure { .. } => false,
        }
    }
}

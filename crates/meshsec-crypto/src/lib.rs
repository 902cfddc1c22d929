//! Meshsec Cryptographic Primitives
//!
//! Cryptographic building blocks for the meshsec security sublayer. Pure
//! functions with deterministic outputs and no I/O; all key material is
//! supplied by the caller.
//!
//! # Primitives
//!
//! The security sublayer needs exactly three operations, all built on a raw
//! AES-128 block cipher:
//!
//! ```text
//! AES-128 block primitive
//!        │
//!        ├─▶ CCM* ── CTR stream transform + manual CBC-MAC tag
//!        │           (authenticated payload decryption, 0-16 byte MIC)
//!        │
//!        └─▶ MMO hash ── Matyas-Meyer-Oseas construction
//!                        (keyed hash for transport/load key derivation)
//! ```
//!
//! CCM* differs from packaged AES-CCM in its framing: the counter and
//! authentication blocks are laid out per the mesh protocol's own rules, so
//! the mode is assembled here from the block primitive instead of using an
//! off-the-shelf AEAD.
//!
//! # Security
//!
//! - Authenticity: the CCM* tag binds header and payload to the key and
//!   nonce; a failed tag comparison rejects the frame.
//! - Nonce structure binds each frame to (source address, frame counter,
//!   security control); uniqueness is the caller's responsibility.
//! - Intermediate key material inside the keyed hash is zeroized before
//!   returning.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod block;
pub mod ccm;
pub mod error;
pub mod hash;

pub use block::{BLOCK_SIZE, BlockCipher, KEY_SIZE, NONCE_SIZE};
pub use ccm::{ccm_star_decrypt, ccm_star_encrypt};
pub use error::CryptoError;
pub use hash::{KEY_LOAD_INPUT, KEY_TRANSPORT_INPUT, keyed_hash, mmo_hash};

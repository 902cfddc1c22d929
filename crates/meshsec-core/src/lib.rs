//! Meshsec Security Sublayer
//!
//! Frame security processing for a low-power wireless mesh network:
//! parsing the auxiliary security header, rebuilding the per-frame nonce,
//! resolving which key secured the frame, and running the CCM* transform to
//! decrypt and authenticate the payload.
//!
//! # Processing model
//!
//! ```text
//! raw frame bytes
//!        │
//!        ▼ SecurityHeader::parse          (level patched to the configured
//!        │                                 default; wire level is ignored)
//!        ▼ source resolution              (header field, or the caller's
//!        │                                 address-hint tables)
//!        ▼ candidate keys                 (flow cache → network ring →
//!        │                                 preconfigured, first match wins)
//!        ▼ CCM* decrypt + MIC check
//!        │
//!        ▼ DecryptionOutcome              (plaintext + the key that worked)
//! ```
//!
//! The whole pipeline is synchronous and processes one frame per call; all
//! cross-frame state lives in an explicit [`SecuritySession`]. Failures come
//! back as [`SecurityError`] values; an `AuthFailure` leaves the caller free
//! to display the payload as opaque ciphertext and continue with the next
//! frame.

pub mod config;
pub mod error;
pub mod header;
pub mod keyring;
pub mod session;

pub use config::{KeyByteOrder, KeyParseError, parse_key_string};
pub use error::SecurityError;
pub use header::{KeyIdentifier, SecurityHeader, SecurityLevel};
pub use keyring::{DEFAULT_LINK_KEY, KeyOrigin, KeyRecord, KeyRing};
pub use session::{
    DecryptionOutcome, KeySlot, NoHints, PanId, SecuritySession, SourceResolver,
};

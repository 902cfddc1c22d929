//! Candidate key storage.
//!
//! Keys arrive from two directions: observed in-band (carried by
//! key-transport frames earlier in the capture) and preconfigured by the
//! user. In-band keys are held per network in a [`KeyRing`]; preconfigured
//! keys live in a session-global list that is always tried last. Records are
//! immutable once stored and survive for the whole processing session.

use zeroize::Zeroize;

use meshsec_crypto::KEY_SIZE;

/// The well-known default link key many commissioning flows ship with
/// (`"ZigBeeAlliance09"`).
pub const DEFAULT_LINK_KEY: [u8; KEY_SIZE] = [
    0x5a, 0x69, 0x67, 0x42, 0x65, 0x65, 0x41, 0x6c, 0x6c, 0x69, 0x61, 0x6e, 0x63, 0x65, 0x30, 0x39,
];

/// Where a key record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Supplied by the user before processing started
    Preconfigured,
    /// Observed in-band; the frame number that carried it
    Frame(u32),
}

/// One candidate key with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    key: [u8; KEY_SIZE],
    label: Option<String>,
    origin: KeyOrigin,
}

impl KeyRecord {
    /// Create a record. Records never change after this.
    #[must_use]
    pub fn new(key: [u8; KEY_SIZE], label: Option<String>, origin: KeyOrigin) -> Self {
        Self { key, label, origin }
    }

    /// The raw key bytes.
    #[must_use]
    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// User-supplied label, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Provenance of the key.
    #[must_use]
    pub fn origin(&self) -> KeyOrigin {
        self.origin
    }
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Ordered candidate keys for one network, most recently registered first.
#[derive(Debug, Default)]
pub struct KeyRing {
    records: Vec<KeyRecord>,
}

impl KeyRing {
    /// Create an empty ring.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key at the front of the ring.
    ///
    /// A key identical to the most recently registered one is dropped:
    /// key-transport frames are often retransmitted and would otherwise fill
    /// the ring with copies.
    pub fn register(&mut self, record: KeyRecord) {
        if self.records.first().is_some_and(|head| head.key() == record.key()) {
            return;
        }
        self.records.insert(0, record);
    }

    /// Iterate candidates, most recently registered first.
    pub fn iter(&self) -> impl Iterator<Item = &KeyRecord> {
        self.records.iter()
    }

    /// Number of records in the ring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the ring holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

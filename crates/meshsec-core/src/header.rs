//! Security header codec with wire-exact parsing.
//!
//! The auxiliary security header sits between the network header and the
//! (possibly encrypted) payload:
//!
//! ```text
//! ┌─────────┬───────────────┬──────────────────┬─────────────┐
//! │ control │ frame counter │ extended source  │ key seq no  │
//! │ 1 byte  │ 4 bytes LE    │ 8 bytes LE,      │ 1 byte,     │
//! │         │               │ if nonce flag    │ network key │
//! └─────────┴───────────────┴──────────────────┴─────────────┘
//! ```
//!
//! The control byte packs the security level (3 bits), key identifier
//! (2 bits), extended-nonce flag and verified-frame-counter flag. Modern
//! protocol revisions zero the level bits on the wire and require both sides
//! to substitute a provisioned level, so the parser patches the level before
//! the control byte is used anywhere; the patched byte feeds both the nonce
//! and the authenticated header bytes.

use meshsec_crypto::NONCE_SIZE;

use crate::error::SecurityError;

/// Bit mask for the security level subfield.
pub const LEVEL_MASK: u8 = 0x07;
/// Bit mask for the key identifier subfield.
pub const KEY_ID_MASK: u8 = 0x18;
const KEY_ID_SHIFT: u8 = 3;
/// Flag bit: the header carries the sender's extended address.
pub const EXTENDED_NONCE_FLAG: u8 = 0x20;
/// Flag bit: the receiver must verify frame-counter freshness.
pub const VERIFIED_COUNTER_FLAG: u8 = 0x40;

/// Security level: encryption on/off crossed with MIC length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityLevel {
    /// No encryption, no MIC
    None,
    /// No encryption, 32-bit MIC
    Mic32,
    /// No encryption, 64-bit MIC
    Mic64,
    /// No encryption, 128-bit MIC
    Mic128,
    /// Encryption, no MIC
    Enc,
    /// Encryption, 32-bit MIC
    EncMic32,
    /// Encryption, 64-bit MIC
    EncMic64,
    /// Encryption, 128-bit MIC
    EncMic128,
}

impl SecurityLevel {
    /// Decode from the low three bits of a control byte.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & LEVEL_MASK {
            0 => Self::None,
            1 => Self::Mic32,
            2 => Self::Mic64,
            3 => Self::Mic128,
            4 => Self::Enc,
            5 => Self::EncMic32,
            6 => Self::EncMic64,
            _ => Self::EncMic128,
        }
    }

    /// Wire encoding, right-aligned in the low three bits.
    #[must_use]
    pub fn bits(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Mic32 => 1,
            Self::Mic64 => 2,
            Self::Mic128 => 3,
            Self::Enc => 4,
            Self::EncMic32 => 5,
            Self::EncMic64 => 6,
            Self::EncMic128 => 7,
        }
    }

    /// MIC length in bytes. Depends only on the MIC subfield, not on
    /// whether the payload is encrypted.
    #[must_use]
    pub fn mic_length(self) -> usize {
        match self {
            Self::None | Self::Enc => 0,
            Self::Mic32 | Self::EncMic32 => 4,
            Self::Mic64 | Self::EncMic64 => 8,
            Self::Mic128 | Self::EncMic128 => 16,
        }
    }

    /// Whether the payload is encrypted at this level.
    #[must_use]
    pub fn has_encryption(self) -> bool {
        matches!(self, Self::Enc | Self::EncMic32 | Self::EncMic64 | Self::EncMic128)
    }
}

impl Default for SecurityLevel {
    /// The level modern networks are provisioned with.
    fn default() -> Self {
        Self::EncMic32
    }
}

/// Which key class secured the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyIdentifier {
    /// Link key shared between one source/destination pair
    Link,
    /// The network-wide key; frames carry a key sequence number
    Network,
    /// Key-transport key, derived from a link key with input byte 0x00
    KeyTransport,
    /// Key-load key, derived from a link key with input byte 0x02
    KeyLoad,
}

impl KeyIdentifier {
    /// Decode from the key subfield of a control byte.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match (bits & KEY_ID_MASK) >> KEY_ID_SHIFT {
            0 => Self::Link,
            1 => Self::Network,
            2 => Self::KeyTransport,
            _ => Self::KeyLoad,
        }
    }

    /// Wire encoding, shifted into the key subfield.
    #[must_use]
    pub fn bits(self) -> u8 {
        let raw = match self {
            Self::Link => 0u8,
            Self::Network => 1,
            Self::KeyTransport => 2,
            Self::KeyLoad => 3,
        };
        raw << KEY_ID_SHIFT
    }
}

/// A parsed auxiliary security header.
///
/// The stored control byte already carries the patched security level; the
/// wire-encoded level is discarded at parse time and never consulted again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityHeader {
    control: u8,
    level: SecurityLevel,
    key_id: KeyIdentifier,
    frame_counter: u32,
    extended_source: Option<u64>,
    key_sequence: Option<u8>,
}

impl SecurityHeader {
    /// Parse a security header from `bytes`, substituting `default_level`
    /// for the wire-encoded level bits.
    ///
    /// Returns the header and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// `HeaderTooShort` when fewer bytes remain than the fixed fields plus
    /// the flagged optional fields require; no out-of-bounds access occurs.
    pub fn parse(
        bytes: &[u8],
        default_level: SecurityLevel,
    ) -> Result<(Self, usize), SecurityError> {
        let available = bytes.len();
        if available < 5 {
            return Err(SecurityError::HeaderTooShort { needed: 5, available });
        }

        // Patch the level before the control byte is used anywhere else.
        let control = (bytes[0] & !LEVEL_MASK) | default_level.bits();
        let key_id = KeyIdentifier::from_bits(control);
        let has_source = control & EXTENDED_NONCE_FLAG != 0;

        let needed = 5
            + if has_source { 8 } else { 0 }
            + usize::from(key_id == KeyIdentifier::Network);
        if available < needed {
            return Err(SecurityError::HeaderTooShort { needed, available });
        }

        let mut counter_bytes = [0u8; 4];
        counter_bytes.copy_from_slice(&bytes[1..5]);
        let frame_counter = u32::from_le_bytes(counter_bytes);
        let mut offset = 5;

        let extended_source = if has_source {
            let mut source_bytes = [0u8; 8];
            source_bytes.copy_from_slice(&bytes[offset..offset + 8]);
            offset += 8;
            Some(u64::from_le_bytes(source_bytes))
        } else {
            None
        };

        let key_sequence = if key_id == KeyIdentifier::Network {
            let seq = bytes[offset];
            offset += 1;
            Some(seq)
        } else {
            None
        };

        let header = Self {
            control,
            level: default_level,
            key_id,
            frame_counter,
            extended_source,
            key_sequence,
        };
        Ok((header, offset))
    }

    /// The control byte with the patched security level.
    ///
    /// This is the byte that must replace the wire value in the
    /// authenticated header bytes before tag verification.
    #[must_use]
    pub fn control_byte(&self) -> u8 {
        self.control
    }

    /// Effective security level (always the configured default).
    #[must_use]
    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    /// Key class that secured the frame.
    #[must_use]
    pub fn key_id(&self) -> KeyIdentifier {
        self.key_id
    }

    /// Per-device monotonically increasing frame counter.
    #[must_use]
    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    /// Extended source address, when the extended-nonce flag carried it.
    #[must_use]
    pub fn extended_source(&self) -> Option<u64> {
        self.extended_source
    }

    /// Key sequence number, present on network-key frames.
    #[must_use]
    pub fn key_sequence(&self) -> Option<u8> {
        self.key_sequence
    }

    /// Whether the sender requested frame-counter freshness verification.
    #[must_use]
    pub fn require_verified_counter(&self) -> bool {
        self.control & VERIFIED_COUNTER_FLAG != 0
    }

    /// Build the 13-byte CCM* nonce for the given source address.
    ///
    /// Wire convention throughout: source and counter little-endian, then
    /// the patched control byte. Encrypt and decrypt sides must produce
    /// identical bytes here; a source-resolution mismatch surfaces as a MIC
    /// failure, not a parse error.
    #[must_use]
    pub fn nonce(&self, source: u64) -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce[..8].copy_from_slice(&source.to_le_bytes());
        nonce[8..12].copy_from_slice(&self.frame_counter.to_le_bytes());
        nonce[12] = self.control;
        nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_header() {
        // Link key, no extended nonce: control + counter only.
        let bytes = [0x00, 0x78, 0x56, 0x34, 0x12, 0xAA];
        let (header, used) = SecurityHeader::parse(&bytes, SecurityLevel::EncMic32).unwrap();

        assert_eq!(used, 5);
        assert_eq!(header.key_id(), KeyIdentifier::Link);
        assert_eq!(header.frame_counter(), 0x1234_5678);
        assert_eq!(header.extended_source(), None);
        assert_eq!(header.key_sequence(), None);
    }

    #[test]
    fn parses_extended_source_little_endian() {
        let mut bytes = vec![EXTENDED_NONCE_FLAG, 1, 0, 0, 0];
        bytes.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);

        let (header, used) = SecurityHeader::parse(&bytes, SecurityLevel::EncMic32).unwrap();
        assert_eq!(used, 13);
        assert_eq!(header.extended_source(), Some(0x0807_0605_0403_0201));
    }

    #[test]
    fn network_key_reads_sequence_number() {
        let control = KeyIdentifier::Network.bits();
        let bytes = [control, 0, 0, 0, 0, 0x2A];

        let (header, used) = SecurityHeader::parse(&bytes, SecurityLevel::EncMic32).unwrap();
        assert_eq!(used, 6);
        assert_eq!(header.key_id(), KeyIdentifier::Network);
        assert_eq!(header.key_sequence(), Some(0x2A));
    }

    #[test]
    fn extended_nonce_and_sequence_number_combine() {
        let control = KeyIdentifier::Network.bits() | EXTENDED_NONCE_FLAG;
        let mut bytes = vec![control, 0, 0, 0, 0];
        bytes.extend_from_slice(&[0u8; 8]);
        bytes.push(0x07);

        let (header, used) = SecurityHeader::parse(&bytes, SecurityLevel::EncMic32).unwrap();
        assert_eq!(used, 14);
        assert_eq!(header.extended_source(), Some(0));
        assert_eq!(header.key_sequence(), Some(0x07));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = SecurityHeader::parse(&[0x00, 0x01], SecurityLevel::EncMic32);
        assert_eq!(err, Err(SecurityError::HeaderTooShort { needed: 5, available: 2 }));
    }

    #[test]
    fn extended_nonce_flag_with_short_buffer_is_rejected() {
        // Flag claims 8 more bytes than the buffer holds.
        let bytes = [EXTENDED_NONCE_FLAG, 0, 0, 0, 0, 1, 2, 3];
        let err = SecurityHeader::parse(&bytes, SecurityLevel::EncMic32);
        assert_eq!(err, Err(SecurityError::HeaderTooShort { needed: 13, available: 8 }));
    }

    #[test]
    fn wire_level_bits_are_ignored() {
        for wire_level in 0u8..8 {
            let bytes = [wire_level, 0, 0, 0, 0];
            let (header, _) = SecurityHeader::parse(&bytes, SecurityLevel::EncMic64).unwrap();

            assert_eq!(header.level(), SecurityLevel::EncMic64);
            assert_eq!(header.level().mic_length(), 8);
            assert_eq!(header.control_byte() & LEVEL_MASK, SecurityLevel::EncMic64.bits());
        }
    }

    #[test]
    fn verified_counter_flag_is_preserved() {
        let bytes = [VERIFIED_COUNTER_FLAG, 0, 0, 0, 0];
        let (header, _) = SecurityHeader::parse(&bytes, SecurityLevel::EncMic32).unwrap();
        assert!(header.require_verified_counter());
    }

    #[test]
    fn mic_length_table() {
        assert_eq!(SecurityLevel::None.mic_length(), 0);
        assert_eq!(SecurityLevel::Enc.mic_length(), 0);
        assert_eq!(SecurityLevel::Mic32.mic_length(), 4);
        assert_eq!(SecurityLevel::EncMic32.mic_length(), 4);
        assert_eq!(SecurityLevel::Mic64.mic_length(), 8);
        assert_eq!(SecurityLevel::EncMic64.mic_length(), 8);
        assert_eq!(SecurityLevel::Mic128.mic_length(), 16);
        assert_eq!(SecurityLevel::EncMic128.mic_length(), 16);
    }

    #[test]
    fn level_bits_roundtrip() {
        for bits in 0u8..8 {
            assert_eq!(SecurityLevel::from_bits(bits).bits(), bits);
        }
    }

    #[test]
    fn nonce_layout() {
        let control = KeyIdentifier::Link.bits() | EXTENDED_NONCE_FLAG;
        let mut bytes = vec![control, 0xDD, 0xCC, 0xBB, 0xAA];
        bytes.extend_from_slice(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);

        let (header, _) = SecurityHeader::parse(&bytes, SecurityLevel::EncMic32).unwrap();
        let nonce = header.nonce(header.extended_source().unwrap());

        // Source address (bytes 0-7, little-endian as on the wire).
        assert_eq!(&nonce[..8], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);
        // Frame counter (bytes 8-11).
        assert_eq!(&nonce[8..12], &[0xDD, 0xCC, 0xBB, 0xAA]);
        // Patched control byte.
        assert_eq!(nonce[12], header.control_byte());
    }
}

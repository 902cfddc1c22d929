//! Key-string parsing for preconfigured keys.
//!
//! Users supply keys either as 16 hexadecimal byte pairs, with an optional
//! `:`, `-` or space before any pair, or as a double quote introducing
//! exactly 16 printable characters taken literally. A byte-order flag can
//! reverse the key; it is applied here, once, at parse time, never when the
//! key is used.

use thiserror::Error;

use meshsec_crypto::KEY_SIZE;

/// Byte order to store a parsed key in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyByteOrder {
    /// Leftmost byte of the string becomes byte 0
    #[default]
    Normal,
    /// Leftmost byte of the string becomes byte 15
    Reversed,
}

/// Errors from parsing a configured key string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    /// The key string was empty or whitespace
    #[error("key can't be blank")]
    Blank,

    /// The key string was not valid in either accepted form
    #[error("expected 16 hexadecimal bytes or a 16-character double-quoted string")]
    Malformed,
}

/// Parse a key string into raw key bytes.
pub fn parse_key_string(input: &str, order: KeyByteOrder) -> Result<[u8; KEY_SIZE], KeyParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(KeyParseError::Blank);
    }

    let mut key = [0u8; KEY_SIZE];
    if let Some(rest) = trimmed.strip_prefix('"') {
        let mut chars = rest.chars();
        for slot in 0..KEY_SIZE {
            let ch = chars.next().ok_or(KeyParseError::Malformed)?;
            if !ch.is_ascii_graphic() && ch != ' ' {
                return Err(KeyParseError::Malformed);
            }
            key[position(slot, order)] = ch as u8;
        }
    } else {
        let mut chars = trimmed.chars().peekable();
        for slot in 0..KEY_SIZE {
            if let Some(&sep) = chars.peek() {
                if sep == ':' || sep == '-' || sep == ' ' {
                    chars.next();
                }
            }
            let hi = next_hex_digit(&mut chars)?;
            let lo = next_hex_digit(&mut chars)?;
            key[position(slot, order)] = (hi << 4) | lo;
        }
    }
    Ok(key)
}

fn next_hex_digit(chars: &mut impl Iterator<Item = char>) -> Result<u8, KeyParseError> {
    chars
        .next()
        .and_then(|ch| ch.to_digit(16))
        .map(|digit| digit as u8)
        .ok_or(KeyParseError::Malformed)
}

fn position(slot: usize, order: KeyByteOrder) -> usize {
    match order {
        KeyByteOrder::Normal => slot,
        KeyByteOrder::Reversed => KEY_SIZE - 1 - slot,
    }
}

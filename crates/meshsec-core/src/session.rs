//! Session context, key resolution and the frame decryption entry point.
//!
//! All state the security sublayer keeps between frames lives in a
//! [`SecuritySession`] passed explicitly to every call: the per-network key
//! rings, the global preconfigured keys, and the cache of keys that already
//! verified a flow. There is no global mutable state.
//!
//! # Key resolution
//!
//! For each frame the candidate keys are tried in a fixed order until one
//! verifies:
//!
//! 1. the key that last verified this `(network, key class)` flow,
//! 2. the network's ring, most recently registered first,
//! 3. every preconfigured key.
//!
//! The cache is purely a try-first optimization for multi-pass processing:
//! on a miss the scan continues through the full list, so the verdict never
//! depends on cache state, only the number of attempts does.

use std::collections::HashMap;

use tracing::{debug, trace};

use meshsec_crypto::hash::{KEY_LOAD_INPUT, KEY_TRANSPORT_INPUT};
use meshsec_crypto::{KEY_SIZE, ccm_star_decrypt, keyed_hash};
use zeroize::Zeroize;

use crate::config::{KeyByteOrder, parse_key_string};
use crate::error::SecurityError;
use crate::header::{KeyIdentifier, SecurityHeader, SecurityLevel};
use crate::keyring::{KeyOrigin, KeyRecord, KeyRing};

/// Network (PAN) identifier keying the per-network rings and caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanId(pub u16);

/// Cache slot for a verified key.
///
/// Network-key frames and the link-key family (link, key-transport,
/// key-load) are cached separately: a network runs one network key but many
/// link keys, and a hit for one class says nothing about the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySlot {
    /// Frames secured with the network key
    Network,
    /// Frames secured with a link key or a key derived from one
    Link,
}

impl KeySlot {
    /// Map a key identifier onto its cache slot.
    #[must_use]
    pub fn for_key_id(key_id: KeyIdentifier) -> Self {
        match key_id {
            KeyIdentifier::Network => Self::Network,
            KeyIdentifier::Link | KeyIdentifier::KeyTransport | KeyIdentifier::KeyLoad => {
                Self::Link
            },
        }
    }
}

/// Address-hint provider: the lower layers' short-to-extended address
/// translation, consulted when a frame does not carry its source address.
///
/// How a lookup distinguishes direct traffic from upstream- or
/// downstream-relayed traffic is the implementor's concern; the core only
/// says which key class the frame used.
pub trait SourceResolver {
    /// Resolve the extended source address for a frame on `pan`.
    fn resolve_extended_source(&self, pan: PanId, key_id: KeyIdentifier) -> Option<u64>;
}

impl<F> SourceResolver for F
where
    F: Fn(PanId, KeyIdentifier) -> Option<u64>,
{
    fn resolve_extended_source(&self, pan: PanId, key_id: KeyIdentifier) -> Option<u64> {
        self(pan, key_id)
    }
}

/// A resolver with no hint tables; every lookup fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHints;

impl SourceResolver for NoHints {
    fn resolve_extended_source(&self, _pan: PanId, _key_id: KeyIdentifier) -> Option<u64> {
        None
    }
}

/// Successful outcome of processing one secured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptionOutcome {
    /// The payload was never encrypted. When the level carries a MIC it has
    /// been verified and `key` names the key that did; at the no-MIC level
    /// `key` is `None` and nothing was checked.
    Integrity {
        /// The cleartext payload bytes
        payload: Vec<u8>,
        /// Key that verified the MIC, when one was present
        key: Option<KeyRecord>,
    },
    /// The payload was encrypted and has been decrypted (and, when a MIC was
    /// present, verified).
    Decrypted {
        /// The recovered plaintext
        payload: Vec<u8>,
        /// Key that decrypted the frame
        key: KeyRecord,
    },
}

impl DecryptionOutcome {
    /// The recovered payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match self {
            Self::Integrity { payload, .. } | Self::Decrypted { payload, .. } => payload,
        }
    }

    /// The key involved, if any key was used at all.
    #[must_use]
    pub fn key(&self) -> Option<&KeyRecord> {
        match self {
            Self::Integrity { key, .. } => key.as_ref(),
            Self::Decrypted { key, .. } => Some(key),
        }
    }
}

/// All security state for one processing session.
pub struct SecuritySession {
    default_level: SecurityLevel,
    rings: HashMap<PanId, KeyRing>,
    preconfigured: Vec<KeyRecord>,
    cache: HashMap<(PanId, KeySlot), KeyRecord>,
    trials: u64,
}

impl SecuritySession {
    /// Create a session that processes every frame at `default_level`,
    /// whatever level the wire claims.
    #[must_use]
    pub fn new(default_level: SecurityLevel) -> Self {
        Self {
            default_level,
            rings: HashMap::new(),
            preconfigured: Vec::new(),
            cache: HashMap::new(),
            trials: 0,
        }
    }

    /// The session's configured security level.
    #[must_use]
    pub fn default_level(&self) -> SecurityLevel {
        self.default_level
    }

    /// Parse and add a user-configured key to the global candidate list.
    ///
    /// The byte-order flag is applied here, once; the stored record is used
    /// as-is from then on. Preconfigured keys are tried after every
    /// network-specific candidate.
    pub fn add_preconfigured_key(
        &mut self,
        key_str: &str,
        order: KeyByteOrder,
        label: Option<&str>,
    ) -> Result<(), SecurityError> {
        let key = parse_key_string(key_str, order)?;
        self.preconfigured.push(KeyRecord::new(
            key,
            label.map(str::to_owned),
            KeyOrigin::Preconfigured,
        ));
        Ok(())
    }

    /// Feed in a key observed in-band, e.g. from a key-transport frame the
    /// host dissected elsewhere in the stack. It becomes the first-tried
    /// ring candidate for subsequent frames on `pan`.
    pub fn register_observed_key(&mut self, pan: PanId, key: [u8; KEY_SIZE], origin: KeyOrigin) {
        self.rings.entry(pan).or_default().register(KeyRecord::new(key, None, origin));
    }

    /// Look a preconfigured key up by its label, for diagnostic and export
    /// tooling.
    #[must_use]
    pub fn lookup_key_by_label(&self, label: &str) -> Option<[u8; KEY_SIZE]> {
        for record in &self.preconfigured {
            trace!(label = record.label(), "considering preconfigured key");
            if record.label() == Some(label) {
                return Some(*record.key());
            }
        }
        None
    }

    /// The key that last verified a flow, if any.
    #[must_use]
    pub fn cached_key(&self, pan: PanId, slot: KeySlot) -> Option<&KeyRecord> {
        self.cache.get(&(pan, slot))
    }

    /// Total key trials performed by this session. Each candidate key fed to
    /// the CCM* transform counts as one trial; the per-flow cache exists to
    /// keep this from growing quadratically on multi-pass processing.
    #[must_use]
    pub fn key_trials(&self) -> u64 {
        self.trials
    }

    /// Parse the security header at `offset` and decrypt (or
    /// integrity-check) the frame's payload.
    ///
    /// `frame` is the captured record from the start of the lower-layer
    /// header: everything before the end of the security header is covered
    /// by the MIC. `reported_len` is the record's claimed total length,
    /// larger than `frame.len()` when the capture was cut short.
    ///
    /// # Errors
    ///
    /// - `HeaderTooShort`: the security header's fields don't fit
    /// - `TruncatedCiphertext`: the capture ends before payload plus MIC
    /// - `FrameTooLarge`: authenticated data would overflow the CCM* counter
    /// - `UnknownSource`: no source address on the wire and no hint resolves
    ///   one; no decryption is attempted without a nonce
    /// - `AuthFailure`: every candidate key was tried and none verified
    pub fn decrypt_secure_frame(
        &mut self,
        frame: &[u8],
        offset: usize,
        reported_len: usize,
        pan: PanId,
        resolver: &dyn SourceResolver,
    ) -> Result<DecryptionOutcome, SecurityError> {
        let header_bytes = frame.get(offset..).unwrap_or(&[]);
        let (header, header_len) = SecurityHeader::parse(header_bytes, self.default_level)?;
        let payload_start = offset + header_len;
        let mic_len = header.level().mic_length();

        // Claimed vs captured payload: an empty payload still has to cover
        // its MIC, and a sliced capture cannot be decrypted at all.
        let expected = reported_len.saturating_sub(payload_start);
        let available = frame.len() - payload_start;
        if expected < mic_len || available < expected {
            return Err(SecurityError::TruncatedCiphertext { expected, available });
        }
        let payload_len = expected - mic_len;
        let payload_end = payload_start + payload_len;

        if !header.level().has_encryption() {
            if mic_len == 0 {
                // Nothing to decrypt, nothing to verify.
                return Ok(DecryptionOutcome::Integrity {
                    payload: frame[payload_start..payload_end].to_vec(),
                    key: None,
                });
            }

            // Integrity-only level: the cleartext payload joins the
            // authenticated data and only the MIC runs through the cipher.
            ensure_aad_fits(payload_end)?;
            let source = self.resolve_source(&header, pan, resolver)?;
            let nonce = header.nonce(source);
            let mut auth = frame[..payload_end].to_vec();
            auth[offset] = header.control_byte();
            let mic = &frame[payload_end..payload_end + mic_len];

            let (key, _) = self.try_candidates(pan, header.key_id(), |trial| {
                ccm_star_decrypt(trial, &nonce, &auth, mic, mic_len).ok()
            })?;
            return Ok(DecryptionOutcome::Integrity {
                payload: frame[payload_start..payload_end].to_vec(),
                key: Some(key),
            });
        }

        ensure_aad_fits(payload_start)?;
        let source = self.resolve_source(&header, pan, resolver)?;
        let nonce = header.nonce(source);
        let mut auth = frame[..payload_start].to_vec();
        auth[offset] = header.control_byte();
        let ciphertext = &frame[payload_start..payload_end + mic_len];

        let (key, payload) = self.try_candidates(pan, header.key_id(), |trial| {
            ccm_star_decrypt(trial, &nonce, &auth, ciphertext, mic_len).ok()
        })?;
        Ok(DecryptionOutcome::Decrypted { payload, key })
    }

    fn resolve_source(
        &self,
        header: &SecurityHeader,
        pan: PanId,
        resolver: &dyn SourceResolver,
    ) -> Result<u64, SecurityError> {
        if let Some(source) = header.extended_source() {
            return Ok(source);
        }
        resolver.resolve_extended_source(pan, header.key_id()).ok_or_else(|| {
            debug!(pan = pan.0, key_id = ?header.key_id(), "extended source unknown");
            SecurityError::UnknownSource
        })
    }

    /// Try every candidate key in order until `attempt` succeeds.
    ///
    /// Key-transport and key-load frames are tried with the derived sub-key;
    /// the ring stores the underlying link key either way. The winning
    /// record refreshes the flow cache.
    fn try_candidates<F>(
        &mut self,
        pan: PanId,
        key_id: KeyIdentifier,
        mut attempt: F,
    ) -> Result<(KeyRecord, Vec<u8>), SecurityError>
    where
        F: FnMut(&[u8; KEY_SIZE]) -> Option<Vec<u8>>,
    {
        let slot = KeySlot::for_key_id(key_id);
        let candidates = self.collect_candidates(pan, slot);

        let mut tried = 0;
        for record in candidates {
            tried += 1;
            let mut trial = derive_trial_key(record.key(), key_id);
            let result = attempt(&trial);
            trial.zeroize();

            if let Some(payload) = result {
                self.trials += tried;
                debug!(
                    pan = pan.0,
                    origin = ?record.origin(),
                    tried,
                    "candidate key verified the frame"
                );
                self.cache.insert((pan, slot), record.clone());
                return Ok((record, payload));
            }
        }

        self.trials += tried;
        debug!(pan = pan.0, tried = tried as usize, "no candidate key verified the frame");
        Err(SecurityError::AuthFailure { tried: tried as usize })
    }

    /// Snapshot the candidate list for one attempt: cached flow key first,
    /// then the network ring (most recent first), then the preconfigured
    /// keys, skipping copies of the cached key.
    fn collect_candidates(&self, pan: PanId, slot: KeySlot) -> Vec<KeyRecord> {
        let cached = self.cache.get(&(pan, slot));
        let mut candidates: Vec<KeyRecord> = Vec::new();
        if let Some(record) = cached {
            candidates.push(record.clone());
        }

        let ring_records = self.rings.get(&pan).into_iter().flat_map(KeyRing::iter);
        for record in ring_records.chain(self.preconfigured.iter()) {
            if cached.is_some_and(|c| c.key() == record.key()) {
                continue;
            }
            candidates.push(record.clone());
        }
        candidates
    }
}

/// Reject authenticated data needing more blocks than the 2-byte CCM*
/// counter can address.
fn ensure_aad_fits(aad_len: usize) -> Result<(), SecurityError> {
    if 1 + aad_len / 16 > 1 << 16 {
        return Err(SecurityError::FrameTooLarge);
    }
    Ok(())
}

/// The key actually fed to the cipher for a given key class.
fn derive_trial_key(key: &[u8; KEY_SIZE], key_id: KeyIdentifier) -> [u8; KEY_SIZE] {
    match key_id {
        KeyIdentifier::KeyTransport => keyed_hash(key, KEY_TRANSPORT_INPUT),
        KeyIdentifier::KeyLoad => keyed_hash(key, KEY_LOAD_INPUT),
        KeyIdentifier::Link | KeyIdentifier::Network => *key,
    }
}

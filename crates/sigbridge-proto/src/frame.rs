//! Signed fixed-length binary UDP frame.
//!
//! Layout on the wire, 14 bytes total (Big Endian):
//!
//! `[nonce: 4] [signal_id: 1] [ack_code: 1] [value: 4] [mac: 4]`
//!
//! The `mac` is the last 4 bytes of `SHA-256(first 10 bytes || key)` with a
//! pre-shared key. Any mismatch discards the frame silently: no NACK is
//! sent, so an attacker learns nothing about why a frame was rejected.
//!
//! The `value` field is big-endian and type-dependent: two's-complement
//! integer for `Int`-typed signals, IEEE-754 single precision for `Float`
//! and `Bool` signals (bool as 1.0/0.0). Inbound set requests always carry
//! a float.

use sha2::{Digest, Sha256};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::ProtocolError;

/// Exact wire size of a frame.
pub const FRAME_LEN: usize = 14;

/// Ack code carried by outbound broadcasts.
pub const ACK_OK: u8 = 0xA0;

/// Ack code of an inbound set request.
pub const ACK_SET: u8 = 0x10;

/// Number of payload bytes covered by the MAC.
const SIGNED_LEN: usize = 10;

/// Pre-shared frame signing key (128 bytes).
///
/// The default key matches the deployed firmware. Production installs
/// override it with `SignKey::from_hex`.
#[derive(Clone)]
pub struct SignKey([u8; 128]);

impl Default for SignKey {
    fn default() -> Self {
        let mut key = [0u8; 128];
        for (chunk, byte) in key.chunks_mut(8).zip(std::iter::repeat(*b"WOODRUFF")) {
            chunk.copy_from_slice(&byte);
        }
        Self(key)
    }
}

impl std::fmt::Debug for SignKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.write_str("SignKey(..)")
    }
}

impl SignKey {
    /// Parse a key from 256 hex characters.
    pub fn from_hex(hex: &str) -> Result<Self, ProtocolError> {
        let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
        if hex.len() != 256 {
            return Err(ProtocolError::BadKey(format!(
                "expected 256 hex chars, got {}",
                hex.len()
            )));
        }

        let mut key = [0u8; 128];
        for (i, byte) in key.iter_mut().enumerate() {
            let pair = hex
                .get(i * 2..i * 2 + 2)
                .ok_or_else(|| ProtocolError::BadKey("non-ASCII hex input".to_string()))?;
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|e| ProtocolError::BadKey(format!("invalid hex at byte {i}: {e}")))?;
        }
        Ok(Self(key))
    }

    /// Truncated MAC over a frame payload.
    fn mac(&self, payload: &[u8]) -> [u8; 4] {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hasher.update(self.0);
        let digest = hasher.finalize();

        let mut mac = [0u8; 4];
        mac.copy_from_slice(&digest[28..32]);
        mac
    }
}

/// One 14-byte signal frame.
///
/// Fields are raw byte arrays (Big Endian) so the struct can be cast
/// directly from untrusted datagram bytes: every 14-byte pattern is a
/// structurally valid frame, and authentication is a separate check in
/// [`SignalFrame::decode`].
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SignalFrame {
    nonce: [u8; 4],
    signal_id: u8,
    ack_code: u8,
    value: [u8; 4],
    mac: [u8; 4],
}

impl SignalFrame {
    /// Encode and sign a frame.
    #[must_use]
    pub fn encode(
        nonce: [u8; 4],
        signal_id: u8,
        ack_code: u8,
        value: [u8; 4],
        key: &SignKey,
    ) -> [u8; FRAME_LEN] {
        let mut wire = [0u8; FRAME_LEN];
        wire[0..4].copy_from_slice(&nonce);
        wire[4] = signal_id;
        wire[5] = ack_code;
        wire[6..10].copy_from_slice(&value);

        let mac = key.mac(&wire[..SIGNED_LEN]);
        wire[10..14].copy_from_slice(&mac);
        wire
    }

    /// Parse and authenticate a frame from datagram bytes (zero-copy).
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::FrameLength`] unless the datagram is exactly 14
    ///   bytes
    /// - [`ProtocolError::BadSignature`] if the MAC does not verify
    pub fn decode<'a>(bytes: &'a [u8], key: &SignKey) -> Result<&'a Self, ProtocolError> {
        if bytes.len() != FRAME_LEN {
            return Err(ProtocolError::FrameLength { expected: FRAME_LEN, actual: bytes.len() });
        }

        let frame = Self::ref_from_bytes(bytes)
            .map_err(|_| ProtocolError::FrameLength { expected: FRAME_LEN, actual: bytes.len() })?;

        let claimed = frame.mac;
        if key.mac(&bytes[..SIGNED_LEN]) != claimed {
            return Err(ProtocolError::BadSignature);
        }

        Ok(frame)
    }

    /// Anti-replay nonce chosen by the sender.
    #[must_use]
    pub fn nonce(&self) -> [u8; 4] {
        self.nonce
    }

    /// Wire identifier of the target signal.
    #[must_use]
    pub fn signal_id(&self) -> u8 {
        self.signal_id
    }

    /// Command/ack code ([`ACK_SET`] for inbound set requests).
    #[must_use]
    pub fn ack_code(&self) -> u8 {
        self.ack_code
    }

    /// Raw big-endian value field.
    #[must_use]
    pub fn value_bytes(&self) -> [u8; 4] {
        self.value
    }

    /// Value field as IEEE-754 single precision (set-request encoding).
    #[must_use]
    pub fn value_f32(&self) -> f32 {
        f32::from_be_bytes(self.value)
    }

    /// Value field as a two's-complement integer (`Int` signal encoding).
    #[must_use]
    pub fn value_i32(&self) -> i32 {
        i32::from_be_bytes(self.value)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn frame_is_exactly_14_bytes() {
        assert_eq!(std::mem::size_of::<SignalFrame>(), FRAME_LEN);
    }

    #[test]
    fn default_key_matches_deployed_firmware() {
        let key = SignKey::default();
        assert_eq!(&key.0[..8], b"WOODRUFF");
        assert_eq!(&key.0[120..], b"WOODRUFF");
    }

    #[test]
    fn key_round_trips_through_hex() {
        let default = SignKey::default();
        let hex = hex::encode(default.0);
        let parsed = SignKey::from_hex(&hex).unwrap();
        assert_eq!(parsed.0, default.0);
    }

    #[test]
    fn rejects_short_key() {
        assert!(SignKey::from_hex("deadbeef").is_err());
    }

    #[test]
    fn encode_decode_round_trip() {
        let key = SignKey::default();
        let wire =
            SignalFrame::encode([1, 2, 3, 4], 0x2A, ACK_OK, 5.0f32.to_be_bytes(), &key);

        let frame = SignalFrame::decode(&wire, &key).unwrap();
        assert_eq!(frame.nonce(), [1, 2, 3, 4]);
        assert_eq!(frame.signal_id(), 0x2A);
        assert_eq!(frame.ack_code(), ACK_OK);
        assert!((frame.value_f32() - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn rejects_wrong_length() {
        let key = SignKey::default();
        assert!(matches!(
            SignalFrame::decode(&[0u8; 13], &key),
            Err(ProtocolError::FrameLength { expected: 14, actual: 13 })
        ));
        assert!(matches!(
            SignalFrame::decode(&[0u8; 15], &key),
            Err(ProtocolError::FrameLength { expected: 14, actual: 15 })
        ));
    }

    #[test]
    fn rejects_wrong_key() {
        let wire = SignalFrame::encode([0; 4], 1, ACK_SET, [0; 4], &SignKey::default());
        let other = SignKey::from_hex(&"ab".repeat(128)).unwrap();
        assert!(matches!(
            SignalFrame::decode(&wire, &other),
            Err(ProtocolError::BadSignature)
        ));
    }

    proptest! {
        #[test]
        fn round_trip(nonce in any::<[u8; 4]>(), id in any::<u8>(), ack in any::<u8>(), value in any::<[u8; 4]>()) {
            let key = SignKey::default();
            let wire = SignalFrame::encode(nonce, id, ack, value, &key);

            let frame = SignalFrame::decode(&wire, &key).unwrap();
            prop_assert_eq!(frame.signal_id(), id);
            prop_assert_eq!(frame.ack_code(), ack);
            prop_assert_eq!(frame.value_bytes(), value);
            prop_assert_eq!(frame.nonce(), nonce);
        }

        #[test]
        fn any_single_bit_flip_is_rejected(
            nonce in any::<[u8; 4]>(),
            id in any::<u8>(),
            value in any::<[u8; 4]>(),
            bit in 0usize..FRAME_LEN * 8,
        ) {
            let key = SignKey::default();
            let mut wire = SignalFrame::encode(nonce, id, ACK_SET, value, &key);
            wire[bit / 8] ^= 1 << (bit % 8);

            prop_assert!(matches!(
                SignalFrame::decode(&wire, &key),
                Err(ProtocolError::BadSignature)
            ));
        }
    }
}

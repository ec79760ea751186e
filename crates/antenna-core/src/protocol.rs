//! Antenna GATT identifiers and the characteristic value codec

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use uuid::Uuid;

use crate::error::DecodeError;

// ----------------------------------------------------------------------------
// BLE Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Antenna message service UUID
pub const ANTENNA_SERVICE_UUID: Uuid = Uuid::from_u128(0x12345678_1234_1234_1234_123456789abc);

/// Characteristic the client writes outgoing messages to
pub const ANTENNA_WRITE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x12345678_1234_1234_1234_123456789abe);

/// Characteristic the antenna notifies incoming messages on
pub const ANTENNA_NOTIFY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x12345678_1234_1234_1234_123456789abd);

/// Text sent by the SOS action; incoming messages containing it are flagged
pub const EMERGENCY_PHRASE: &str = "Emergencia! SOS! Emergencia!";

// ----------------------------------------------------------------------------
// Payload Codec
// ----------------------------------------------------------------------------

/// Encode text as a characteristic value: the base64 form of its UTF-8 bytes.
///
/// One message is exactly one characteristic value; there is no framing.
pub fn encode_payload(text: &str) -> Vec<u8> {
    STANDARD.encode(text.as_bytes()).into_bytes()
}

/// Decode a characteristic value produced by [`encode_payload`]
pub fn decode_payload(value: &[u8]) -> Result<String, DecodeError> {
    // Stray whitespace from serial bridges is not part of the encoding
    let trimmed = value.trim_ascii();
    let bytes = STANDARD.decode(trimmed)?;
    Ok(String::from_utf8(bytes)?)
}

/// Whether text should be flagged as an emergency
pub fn is_emergency_text(text: &str, phrase: &str) -> bool {
    !phrase.is_empty() && text.contains(phrase)
}

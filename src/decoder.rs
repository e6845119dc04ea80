//! Pure decoding of advertisement payloads.
//!
//! Nothing in here touches shared state; every function maps bytes (or a
//! broadcast name) to display-ready strings.

use std::fmt::Write;
use thiserror::Error;

/// Service UUID (0x1803) announced in service data by proximity beacons, in
/// on-air little-endian byte order.
pub const PROXIMITY_BEACON_SERVICE_UUID: [u8; 2] = [0x03, 0x18];

/// Minimum manufacturer data length covering every fixed offset below.
pub const PROXIMITY_BEACON_MIN_LEN: usize = 27;

const UUID_RANGE: std::ops::Range<usize> = 4..20;
const MAJOR_RANGE: std::ops::Range<usize> = 21..23;
const MINOR_RANGE: std::ops::Range<usize> = 24..26;

/// Errors raised while decoding a single advertisement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The payload is shorter than the fixed layout requires.
    #[error("Malformed payload: expected at least {expected} bytes, got {actual}")]
    MalformedPayload { expected: usize, actual: usize },
}

/// Identifier fields carried by a proximity beacon, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BeaconFields {
    /// 16-byte identifier, 32 lowercase hex characters.
    pub uuid: String,
    /// 2-byte major, 4 hex characters.
    pub major: String,
    /// 2-byte minor, 4 hex characters.
    pub minor: String,
    /// Last byte of the payload, unpadded hex (`"5"`, not `"05"`).
    pub battery: String,
}

/// Decode the manufacturer data of a proximity beacon.
///
/// `manufacturer_data` includes the 2-byte company identifier. Layout:
/// `[4, 20)` identifier, `[21, 23)` major, `[24, 26)` minor, last byte battery.
pub fn decode_proximity_beacon(manufacturer_data: &[u8]) -> Result<BeaconFields, DecodeError> {
    if manufacturer_data.len() < PROXIMITY_BEACON_MIN_LEN {
        return Err(DecodeError::MalformedPayload {
            expected: PROXIMITY_BEACON_MIN_LEN,
            actual: manufacturer_data.len(),
        });
    }

    let battery = manufacturer_data[manufacturer_data.len() - 1];

    Ok(BeaconFields {
        uuid: hex::encode(&manufacturer_data[UUID_RANGE]),
        major: hex::encode(&manufacturer_data[MAJOR_RANGE]),
        minor: hex::encode(&manufacturer_data[MINOR_RANGE]),
        battery: format!("{battery:x}"),
    })
}

/// True iff `service_uuid` is exactly the proximity beacon signature.
pub fn is_proximity_beacon_service(service_uuid: &[u8]) -> bool {
    service_uuid == PROXIMITY_BEACON_SERVICE_UUID
}

/// Render bytes as lowercase hex pairs, each followed by one space.
///
/// The dashboard relies on this exact shape, trailing space included:
/// `[0xAA, 0xBB]` becomes `"aa bb "`.
pub fn format_raw_bytes(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len() * 3);
    for byte in raw {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x} ");
    }
    out
}

/// Strip leading and trailing non-printable code points from a broadcast name.
///
/// Interior characters are kept as-is. A name made only of non-printable
/// characters becomes the empty string.
pub fn sanitize_name(name: &str) -> String {
    name.trim_matches(|c: char| !is_printable(c)).to_string()
}

fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    if c.is_control() || c.is_whitespace() {
        return false;
    }
    // Invisible format characters and the replacement character show up in
    // names of cheap devices that pad with garbage.
    !matches!(
        c,
        '\u{00AD}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{FEFF}'
            | '\u{FFFD}'
    )
}

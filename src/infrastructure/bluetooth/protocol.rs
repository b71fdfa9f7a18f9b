//! Heart Rate Service protocol
//!
//! UUIDs and payload decoding for the Bluetooth SIG Heart Rate service
//! (assigned numbers 0x180D / 0x2A37).

use crate::domain::models::HeartRateMeasurement;
use btleplug::api::bleuuid::uuid_from_u16;
use thiserror::Error;
use uuid::Uuid;

/// Heart Rate service.
pub const HEART_RATE_SERVICE: Uuid = uuid_from_u16(0x180D);

/// Heart Rate Measurement characteristic.
pub const HEART_RATE_MEASUREMENT: Uuid = uuid_from_u16(0x2A37);

/// Bit 0 of the flags byte: the measurement value is a little-endian u16
/// rather than a single byte.
const FLAG_VALUE_FORMAT_U16: u8 = 0x01;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The notification carried no bytes at all.
    #[error("notification carried no data")]
    Empty,
    /// The flags byte announced more value bytes than the payload holds.
    #[error("payload truncated: expected {expected} value byte(s), found {found}")]
    Truncated { expected: usize, found: usize },
}

/// Decode one Heart Rate Measurement notification payload.
///
/// # Payload layout
///
/// ```text
/// [0]     : Flags bitmask
///           bit 0: value format (0 = u8, 1 = u16 little-endian)
///           bit 1-2: sensor contact status
///           bit 3: energy expended field present
///           bit 4: RR-interval field present
/// [1]     : Heart rate value (u8), or
/// [1-2]   : Heart rate value (u16 little-endian)
/// [3..]   : Optional energy expended / RR-interval fields
/// ```
///
/// Only the heart rate value is decoded; the optional trailing fields are
/// accepted and ignored.
pub fn decode_measurement(payload: &[u8]) -> Result<HeartRateMeasurement, DecodeError> {
    let (&flags, value) = payload.split_first().ok_or(DecodeError::Empty)?;

    let bpm = if flags & FLAG_VALUE_FORMAT_U16 != 0 {
        match value {
            [low, high, ..] => u16::from_le_bytes([*low, *high]),
            _ => {
                return Err(DecodeError::Truncated {
                    expected: 2,
                    found: value.len(),
                })
            }
        }
    } else {
        match value {
            [byte, ..] => u16::from(*byte),
            [] => {
                return Err(DecodeError::Truncated {
                    expected: 1,
                    found: 0,
                })
            }
        }
    };

    Ok(HeartRateMeasurement { bpm })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_u8_value() {
        assert_eq!(decode_measurement(&[0x00, 72]).unwrap().bpm, 72);
    }

    #[test]
    fn decodes_u16_value_little_endian() {
        assert_eq!(decode_measurement(&[0x01, 0x2C, 0x01]).unwrap().bpm, 300);
    }

    #[test]
    fn ignores_trailing_optional_fields() {
        // Sensor contact + energy expended + RR intervals present.
        let payload = [0x1E, 72, 0x34, 0x12, 0xA0, 0x03];
        assert_eq!(decode_measurement(&payload).unwrap().bpm, 72);

        // Same, with the 16-bit value format flag set.
        let payload = [0x1F, 72, 0x00, 0x34, 0x12, 0xA0, 0x03];
        assert_eq!(decode_measurement(&payload).unwrap().bpm, 72);
    }

    #[test]
    fn empty_payload_is_distinct_from_truncation() {
        assert_eq!(decode_measurement(&[]), Err(DecodeError::Empty));
        assert_eq!(
            decode_measurement(&[0x01]),
            Err(DecodeError::Truncated {
                expected: 2,
                found: 0
            })
        );
        assert_eq!(
            decode_measurement(&[0x01, 72]),
            Err(DecodeError::Truncated {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            decode_measurement(&[0x00]),
            Err(DecodeError::Truncated {
                expected: 1,
                found: 0
            })
        );
    }
}

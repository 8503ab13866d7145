//! The "Latest page" record.
//!
//! Decodes the 9-byte payload of characteristic 0x3002, a pointer and
//! status record for the sensor's internal recording memory.

use bytes::Buf;
use chrono::{DateTime, TimeZone, Utc};

use crate::data::DecodeError;

/// One decoded "Latest page" record.
///
/// Byte layout (little-endian): UNIX time (4), measurement interval
/// in seconds (2), latest page index (2), latest row index (1).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatestPageInfo {
    /// Device clock as a UNIX timestamp. Zero means the clock has
    /// never been set.
    pub unix_time: u32,
    /// Measurement interval in seconds.
    pub interval_seconds: u16,
    /// Index of the page currently being written.
    pub latest_page: u16,
    /// Index of the row currently being written within that page.
    pub latest_row: u8,
    /// Whether the device is recording. True iff the device clock has
    /// been set (nonzero UNIX time).
    pub memory_on: bool,
}

impl LatestPageInfo {
    /// Fixed wire size of the record in bytes.
    pub const WIRE_SIZE: usize = 9;

    /// Decode a "Latest page" payload.
    ///
    /// Requires at least [`Self::WIRE_SIZE`] bytes; trailing bytes are
    /// ignored. Never reads past the declared length and never panics.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if the payload is too short.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < Self::WIRE_SIZE {
            return Err(DecodeError::Truncated {
                record: "Latest page",
                expected: Self::WIRE_SIZE,
                actual: data.len(),
            });
        }

        let mut buf = &data[..Self::WIRE_SIZE];

        let unix_time = buf.get_u32_le();
        let interval_seconds = buf.get_u16_le();
        let latest_page = buf.get_u16_le();
        let latest_row = buf.get_u8();

        Ok(Self {
            unix_time,
            interval_seconds,
            latest_page,
            latest_row,
            memory_on: unix_time != 0,
        })
    }

    /// The device clock as a UTC timestamp, if it has been set.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        if self.memory_on {
            Utc.timestamp_opt(i64::from(self.unix_time), 0).single()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn payload(unix_time: u32, interval: u16, page: u16, row: u8) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&unix_time.to_le_bytes());
        data.extend_from_slice(&interval.to_le_bytes());
        data.extend_from_slice(&page.to_le_bytes());
        data.push(row);
        data
    }

    #[test]
    fn test_decode_reference_payload() {
        let data = payload(1_700_000_000, 300, 42, 11);
        let p = LatestPageInfo::decode(&data).unwrap();

        assert_eq!(p.unix_time, 1_700_000_000);
        assert_eq!(p.interval_seconds, 300);
        assert_eq!(p.latest_page, 42);
        assert_eq!(p.latest_row, 11);
        assert!(p.memory_on);
    }

    #[test]
    fn test_memory_flag_from_unix_time() {
        let off = LatestPageInfo::decode(&payload(0, 60, 0, 0)).unwrap();
        assert!(!off.memory_on);
        assert_eq!(off.recorded_at(), None);

        let on = LatestPageInfo::decode(&payload(1, 60, 0, 0)).unwrap();
        assert!(on.memory_on);
        assert_eq!(on.recorded_at().unwrap().timestamp(), 1);
    }

    #[test]
    fn test_decode_short_payload() {
        for len in 0..LatestPageInfo::WIRE_SIZE {
            let err = LatestPageInfo::decode(&vec![0u8; len]).unwrap_err();
            assert_eq!(
                err,
                DecodeError::Truncated {
                    record: "Latest page",
                    expected: 9,
                    actual: len,
                }
            );
        }
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut data = payload(5, 60, 1, 2);
        data.extend_from_slice(&[0xFF; 4]);
        let p = LatestPageInfo::decode(&data).unwrap();
        assert_eq!(p.unix_time, 5);
        assert_eq!(p.latest_row, 2);
    }
}

//! Data structures for sensor telemetry.
//!
//! This module contains the decoded record types for the two fixed-layout
//! characteristics exposed by the 2JCIE-BL01, plus the qualitative
//! category mappings derived from them.

pub mod categories;
pub mod measurement;
pub mod page;

pub use categories::{DiscomfortCategory, HeatstrokeCategory, UvCategory};
pub use measurement::LatestMeasurement;
pub use page::LatestPageInfo;

use thiserror::Error;

/// Failure to decode a fixed-layout telemetry record.
///
/// Decode failures never destabilize a session: the session drops the
/// payload and keeps the previous snapshot fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload was shorter than the record's fixed wire size.
    #[error("{record} payload too short: {actual} bytes (need at least {expected})")]
    Truncated {
        /// Name of the record being decoded.
        record: &'static str,
        /// The record's fixed wire size in bytes.
        expected: usize,
        /// The actual payload length.
        actual: usize,
    },
}

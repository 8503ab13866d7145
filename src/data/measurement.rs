//! The "Latest data" record.
//!
//! Decodes the 19-byte payload of characteristic 0x3001 into
//! engineering-unit measurements, per the 2JCIE-BL01 communication
//! manual (all multi-byte fields little-endian).

use bytes::Buf;

use crate::data::categories::{DiscomfortCategory, HeatstrokeCategory, UvCategory};
use crate::data::DecodeError;

/// One decoded environmental measurement from the "Latest data"
/// characteristic.
///
/// Byte layout: Row(1), Temp(2), RH(2), Light(2), UV(2), Pressure(2),
/// Noise(2), Discomfort(2), Heatstroke(2), Battery(2). Scaled values
/// are the raw signed 16-bit integers divided by a fixed-point scale
/// (temperature 0.01 °C, humidity 0.01 %, UV 0.01, pressure 0.1 hPa,
/// noise 0.01 dB, discomfort 0.01, heatstroke 0.01 °C); battery is
/// unsigned millivolts.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatestMeasurement {
    /// Row (sequence) counter within the current page, 0-255.
    pub row: u8,
    /// Temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Relative humidity in percent.
    pub humidity_percent: f64,
    /// Illuminance in lux.
    pub illuminance_lx: i32,
    /// UV index.
    pub uv_index: f64,
    /// Barometric pressure in hectopascal.
    pub pressure_hpa: f64,
    /// Sound noise level in decibel.
    pub sound_db: f64,
    /// Discomfort index.
    pub discomfort_index: f64,
    /// Heatstroke risk factor in degrees Celsius (WBGT approximation).
    pub heatstroke_c: f64,
    /// Battery voltage in volts.
    pub battery_v: f64,
}

impl LatestMeasurement {
    /// Fixed wire size of the record in bytes.
    pub const WIRE_SIZE: usize = 19;

    /// Decode a "Latest data" payload.
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
                record: "Latest data",
                expected: Self::WIRE_SIZE,
                actual: data.len(),
            });
        }

        let mut buf = &data[..Self::WIRE_SIZE];

        let row = buf.get_u8();
        let temperature_c = buf.get_i16_le() as f64 / 100.0;
        let humidity_percent = buf.get_i16_le() as f64 / 100.0;
        let illuminance_lx = buf.get_i16_le() as i32;
        let uv_index = buf.get_i16_le() as f64 / 100.0;
        let pressure_hpa = buf.get_i16_le() as f64 / 10.0;
        let sound_db = buf.get_i16_le() as f64 / 100.0;
        let discomfort_index = buf.get_i16_le() as f64 / 100.0;
        let heatstroke_c = buf.get_i16_le() as f64 / 100.0;
        let battery_v = buf.get_u16_le() as f64 / 1000.0;

        Ok(Self {
            row,
            temperature_c,
            humidity_percent,
            illuminance_lx,
            uv_index,
            pressure_hpa,
            sound_db,
            discomfort_index,
            heatstroke_c,
            battery_v,
        })
    }

    /// Qualitative UV index category for this measurement.
    pub fn uv_category(&self) -> UvCategory {
        UvCategory::from_index(self.uv_index)
    }

    /// Qualitative discomfort category for this measurement.
    pub fn discomfort_category(&self) -> DiscomfortCategory {
        DiscomfortCategory::from_index(self.discomfort_index)
    }

    /// Qualitative heatstroke risk category for this measurement.
    pub fn heatstroke_category(&self) -> HeatstrokeCategory {
        HeatstrokeCategory::from_celsius(self.heatstroke_c)
    }
}

//! BLE Service and Characteristic UUIDs.
//!
//! Contains the UUID constants and advertised-name prefixes used to
//! identify and talk to Omron 2JCIE-BL01 environment sensors.
//!
//! All custom UUIDs share the Omron base `0c4cXXXX-7700-46f4-aa96-d5e974e32a54`.

use uuid::Uuid;

// Sensor Service (Omron Custom)
/// Omron 2JCIE-BL01 Sensor Service UUID (0x3000 on the Omron base).
pub const SENSOR_SERVICE_UUID: Uuid = Uuid::from_u128(0x0c4c_3000_7700_46f4_aa96_d5e974e32a54);
/// "Latest data" characteristic UUID (0x3001, Read). 19-byte record.
pub const LATEST_DATA_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0c4c_3001_7700_46f4_aa96_d5e974e32a54);
/// "Latest page" characteristic UUID (0x3002, Read). 9-byte record.
pub const LATEST_PAGE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0c4c_3002_7700_46f4_aa96_d5e974e32a54);

/// Advertised-name prefixes of supported sensors (Env, IM-BL01, EP-BL01).
pub const DEVICE_NAME_PREFIXES: [&str; 3] = ["Env", "IM", "EP"];

/// Full advertised name of the EnvSensor-BL01 variant.
pub const DEVICE_NAME_FULL: &str = "EnvSensor-BL01";

/// Check if a service UUID is the Omron sensor service.
pub fn is_sensor_service(uuid: &Uuid) -> bool {
    *uuid == SENSOR_SERVICE_UUID
}

/// Check if an advertised name matches one of the known prefixes.
///
/// The match is case-sensitive and an exact prefix match; an empty
/// name never matches.
pub fn name_matches(name: &str) -> bool {
    !name.is_empty() && DEVICE_NAME_PREFIXES.iter().any(|p| name.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        let service = SENSOR_SERVICE_UUID.to_string();
        assert!(service.starts_with("0c4c3000"));
        assert!(service.ends_with("d5e974e32a54"));

        let latest_data = LATEST_DATA_CHARACTERISTIC_UUID.to_string();
        assert!(latest_data.starts_with("0c4c3001"));

        let latest_page = LATEST_PAGE_CHARACTERISTIC_UUID.to_string();
        assert!(latest_page.starts_with("0c4c3002"));
    }

    #[test]
    fn test_is_sensor_service() {
        assert!(is_sensor_service(&SENSOR_SERVICE_UUID));
        assert!(!is_sensor_service(&LATEST_DATA_CHARACTERISTIC_UUID));
    }

    #[test]
    fn test_name_matches() {
        assert!(name_matches(DEVICE_NAME_FULL));
        assert!(name_matches("IM-BL01"));
        assert!(name_matches("EP-BL01"));
        assert!(!name_matches(""));
        assert!(!name_matches("Other"));
        assert!(!name_matches("env")); // prefix match is case-sensitive
    }
}

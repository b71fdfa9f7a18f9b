use std::fmt;

/// Sentinel shown when a peripheral advertises no local name.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown";

/// A discovered peripheral: hardware address plus advertised name.
///
/// Immutable once observed; the name is whatever the first advertisement
/// carried, even if later advertisements differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// 48-bit hardware address widened to `u64` (BLE convention).
    pub address: u64,
    pub name: String,
}

impl DeviceIdentity {
    pub fn new(address: u64, name: Option<String>) -> Self {
        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string());
        Self { address, name }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, format_address(self.address))
    }
}

/// Render a BLE address as colon-separated hex pairs, most significant first.
pub fn format_address(address: u64) -> String {
    let bytes = address.to_be_bytes();
    bytes[2..]
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// One decoded Heart Rate Measurement, in beats per minute as reported by
/// the sensor. No unit conversion is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartRateMeasurement {
    pub bpm: u16,
}

impl fmt::Display for HeartRateMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bpm", self.bpm)
    }
}

/// A single advertisement sighting as delivered by the radio.
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub identity: DeviceIdentity,
    pub rssi: Option<i16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_name_falls_back_to_unknown() {
        assert_eq!(DeviceIdentity::new(1, None).name, "Unknown");
        assert_eq!(DeviceIdentity::new(1, Some(String::new())).name, "Unknown");
        assert_eq!(
            DeviceIdentity::new(1, Some("Polar H10".to_string())).name,
            "Polar H10"
        );
    }

    #[test]
    fn address_renders_as_hex_pairs() {
        assert_eq!(format_address(0xDC_F5_0A_65_9E_70), "DC:F5:0A:65:9E:70");
        assert_eq!(format_address(0), "00:00:00:00:00:00");
    }

    #[test]
    fn identity_display_includes_name_and_address() {
        let identity = DeviceIdentity::new(0xDC_F5_0A_65_9E_70, Some("Polar H10".to_string()));
        assert_eq!(identity.to_string(), "Polar H10 (DC:F5:0A:65:9E:70)");
    }
}

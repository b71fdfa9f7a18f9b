//! Bluetooth Module
//!
//! BLE discovery, connection, and heart-rate notification handling.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       BleSession                         │
//! │   (state machine - public API for the application)       │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │  │ Connection │  │ Protocol │
//! │           │  │            │  │          │
//! │ - adverts │  │ - connect  │  │ - UUIDs  │
//! │   → queue │  │ - GATT     │  │ - payload│
//! │           │  │   subscribe│  │   decode │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Heart Rate service UUIDs and measurement decoding
//! - [`scanner`] - BLE advertisement watching
//! - [`connection`] - Device connection and notification enablement
//! - [`service`] - Session state machine coordinating the above
//! - [`error`] - Session error taxonomy

pub mod connection;
pub mod error;
pub mod protocol;
pub mod scanner;
pub mod service;

pub use error::SessionError;
pub use service::BleSession;

use btleplug::api::BDAddr;

/// Widen a 48-bit hardware address to the `u64` convention used throughout
/// the session.
pub(crate) fn address_to_u64(address: BDAddr) -> u64 {
    address
        .into_inner()
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_widens_most_significant_first() {
        let address = BDAddr::from([0xDC, 0xF5, 0x0A, 0x65, 0x9E, 0x70]);
        assert_eq!(address_to_u64(address), 0xDC_F5_0A_65_9E_70);
    }
}

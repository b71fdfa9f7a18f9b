//! Session error taxonomy.
//!
//! Every platform failure on the connect/subscribe path is converted into
//! one of these reportable conditions; none of them aborts the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid index selected.")]
    InvalidSelection,

    #[error("Device is no longer visible to the adapter.")]
    DeviceUnavailable,

    #[error("Failed to connect to the device: {0}")]
    Connect(btleplug::Error),

    #[error("Failed to discover services on the device: {0}")]
    Discovery(btleplug::Error),

    #[error("Failed to find Heart Rate service.")]
    ServiceNotFound,

    #[error("Failed to find Heart Rate Measurement characteristic.")]
    CharacteristicNotFound,

    #[error("Failed to subscribe to Heart Rate Measurement notifications: {0}")]
    Subscribe(btleplug::Error),

    #[error("Failed to open the notification stream: {0}")]
    NotificationStream(btleplug::Error),
}

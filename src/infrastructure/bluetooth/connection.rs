//! BLE Connection Module
//!
//! Connects to a selected device, resolves the Heart Rate service and its
//! Measurement characteristic, and enables notifications.

use crate::domain::models::DeviceIdentity;
use crate::infrastructure::bluetooth::{address_to_u64, protocol, SessionError};
use btleplug::api::{Central, Characteristic, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use tracing::info;
use uuid::Uuid;

/// GATT targets the connection resolves.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            service_uuid: protocol::HEART_RATE_SERVICE,
            characteristic_uuid: protocol::HEART_RATE_MEASUREMENT,
        }
    }
}

/// A connected peripheral with notifications enabled on the measurement
/// characteristic.
pub struct ConnectionResult {
    pub peripheral: Peripheral,
    pub characteristic: Characteristic,
}

/// BLE connection handler.
pub struct BleConnection {
    adapter: Adapter,
    config: ConnectionConfig,
}

impl BleConnection {
    pub fn new(adapter: Adapter, config: ConnectionConfig) -> Self {
        Self { adapter, config }
    }

    /// Connect to the device and subscribe to heart rate notifications.
    ///
    /// Each sub-step failure maps to its own [`SessionError`] so the driver
    /// can report exactly what went wrong.
    pub async fn connect(&self, identity: &DeviceIdentity) -> Result<ConnectionResult, SessionError> {
        info!("Connecting to {identity}");

        let peripheral = self.find_peripheral(identity.address).await?;
        peripheral.connect().await.map_err(SessionError::Connect)?;

        let characteristic = self.resolve_characteristic(&peripheral).await?;
        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(SessionError::Subscribe)?;

        info!("Notifications enabled on {}", characteristic.uuid);
        Ok(ConnectionResult {
            peripheral,
            characteristic,
        })
    }

    /// Look the address up among the peripherals the scan surfaced.
    async fn find_peripheral(&self, address: u64) -> Result<Peripheral, SessionError> {
        self.adapter
            .peripherals()
            .await
            .map_err(SessionError::Connect)?
            .into_iter()
            .find(|peripheral| address_to_u64(peripheral.address()) == address)
            .ok_or(SessionError::DeviceUnavailable)
    }

    async fn resolve_characteristic(
        &self,
        peripheral: &Peripheral,
    ) -> Result<Characteristic, SessionError> {
        peripheral
            .discover_services()
            .await
            .map_err(SessionError::Discovery)?;

        let service = peripheral
            .services()
            .into_iter()
            .find(|service| service.uuid == self.config.service_uuid)
            .ok_or(SessionError::ServiceNotFound)?;

        service
            .characteristics
            .into_iter()
            .find(|characteristic| characteristic.uuid == self.config.characteristic_uuid)
            .ok_or(SessionError::CharacteristicNotFound)
    }
}

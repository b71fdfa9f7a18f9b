//! BLE Scanner Module
//!
//! Watches advertisements and pushes every sighting into an event channel;
//! deduplication happens downstream in the device registry.

use crate::domain::models::{Advertisement, DeviceIdentity};
use crate::infrastructure::bluetooth::address_to_u64;
use anyhow::Result;
use btleplug::api::{Central, CentralEvent, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Peripheral};
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// BLE scanner feeding advertisements into a channel.
pub struct BleScanner {
    adapter: Adapter,
    event_task: Option<JoinHandle<()>>,
}

impl BleScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            event_task: None,
        }
    }

    /// Start scanning; every newly discovered peripheral is reported on
    /// `events`. The channel closes when the scan stops.
    pub async fn start(&mut self, events: mpsc::UnboundedSender<Advertisement>) -> Result<()> {
        // Stop any existing scan
        self.stop().await?;

        info!("Starting BLE scan");
        let mut adapter_events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;

        let adapter = self.adapter.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = adapter_events.next().await {
                let CentralEvent::DeviceDiscovered(id) = event else {
                    continue;
                };
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                if events.send(advertisement_from(&peripheral).await).is_err() {
                    break;
                }
            }
        });
        self.event_task = Some(task);

        Ok(())
    }

    /// Stop scanning and close the event channel.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.event_task.take() {
            info!("Stopping BLE scan");
            task.abort();
            self.adapter.stop_scan().await?;
        }
        Ok(())
    }

    pub fn is_scanning(&self) -> bool {
        self.event_task.is_some()
    }
}

async fn advertisement_from(peripheral: &Peripheral) -> Advertisement {
    let address = address_to_u64(peripheral.address());
    let (name, rssi) = match peripheral.properties().await {
        Ok(Some(properties)) => (properties.local_name, properties.rssi),
        _ => (None, None),
    };

    Advertisement {
        identity: DeviceIdentity::new(address, name),
        rssi,
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
    }
}

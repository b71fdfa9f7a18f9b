//! Bluetooth Session Module
//!
//! The state machine that drives a run: scan, registry bookkeeping, device
//! selection, subscription, and the decode → gate → forward pipeline.

use crate::domain::forwarding::ForwardingPolicy;
use crate::domain::models::{Advertisement, DeviceIdentity};
use crate::domain::registry::{DeviceRegistry, Observation};
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::{
    connection::{BleConnection, ConnectionConfig},
    protocol::{self, DecodeError},
    scanner::BleScanner,
    SessionError,
};
use crate::infrastructure::osc::MessageSink;
use anyhow::Result;
use btleplug::api::Peripheral as _;
use btleplug::platform::Adapter;
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    Stopped,
    Connecting,
    Subscribed,
    Terminated,
}

/// Signals the subscription loop to exit. The loop checks the flag once per
/// poll interval, so the effect lands within one interval, not instantly.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Decode → forwarding gate → sink, applied to each notification payload.
struct MeasurementPipeline<S> {
    policy: ForwardingPolicy,
    sink: S,
}

impl<S: MessageSink> MeasurementPipeline<S> {
    fn new(sink: S) -> Self {
        Self {
            policy: ForwardingPolicy::new(),
            sink,
        }
    }

    fn process(&mut self, payload: &[u8]) {
        let measurement = match protocol::decode_measurement(payload) {
            Ok(measurement) => measurement,
            Err(DecodeError::Empty) => {
                debug!("Skipping notification without data");
                return;
            }
            Err(err) => {
                warn!("Skipping malformed notification: {err}");
                return;
            }
        };

        if self.policy.admit(&measurement) {
            println!("Heart Rate Measurement: {measurement}");
            if let Err(err) = self.sink.send(&measurement) {
                warn!("Could not forward measurement: {err}");
            }
        } else {
            trace!("Unchanged measurement, not forwarded");
        }
    }
}

/// Resolve an operator-selected index against the registry.
///
/// Runs before any radio capability is touched, so an invalid selection
/// never starts a connection attempt.
fn select_device(registry: &DeviceRegistry, index: u32) -> Result<DeviceIdentity, SessionError> {
    registry.resolve(index).cloned().ok_or_else(|| {
        warn!("No device registered at index {index}");
        SessionError::InvalidSelection
    })
}

/// Drain the advertisement queue into the registry, announcing first
/// sightings. Ends when the scanner closes the channel.
async fn pump_advertisements(
    mut events: mpsc::UnboundedReceiver<Advertisement>,
    registry: Arc<Mutex<DeviceRegistry>>,
) {
    while let Some(advertisement) = events.recv().await {
        let observation = registry
            .lock()
            .unwrap()
            .observe(advertisement.identity.clone());
        match observation {
            Observation::New(index) => {
                debug!(rssi = ?advertisement.rssi, "New device registered");
                println!("[{index}] Device found: {}", advertisement.identity);
            }
            Observation::Duplicate => {
                trace!("Repeat advertisement from {}", advertisement.identity);
            }
        }
    }
}

/// One monitoring session: `Idle → Scanning → Stopped → Connecting →
/// Subscribed → Terminated`.
///
/// Owns the device registry and the forwarding state for its lifetime.
pub struct BleSession<S: MessageSink> {
    scanner: BleScanner,
    connection: BleConnection,
    registry: Arc<Mutex<DeviceRegistry>>,
    pipeline: MeasurementPipeline<S>,
    pump: Option<JoinHandle<()>>,
    stop: StopHandle,
    poll_interval: Duration,
    state: SessionState,
}

impl<S: MessageSink> BleSession<S> {
    pub fn new(adapter: Adapter, sink: S, settings: &Settings) -> Self {
        Self {
            scanner: BleScanner::new(adapter.clone()),
            connection: BleConnection::new(adapter, ConnectionConfig::default()),
            registry: Arc::new(Mutex::new(DeviceRegistry::new())),
            pipeline: MeasurementPipeline::new(sink),
            pump: None,
            stop: StopHandle::new(),
            poll_interval: settings.session.poll_interval(),
            state: SessionState::Idle,
        }
    }

    /// Handle for stopping the subscription loop from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn device_count(&self) -> usize {
        self.registry.lock().unwrap().len()
    }

    /// Begin discovery. Valid once per session.
    pub async fn start_scanning(&mut self) -> Result<()> {
        anyhow::ensure!(
            self.state == SessionState::Idle,
            "discovery already started"
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.scanner.start(events_tx).await?;
        self.pump = Some(tokio::spawn(pump_advertisements(
            events_rx,
            Arc::clone(&self.registry),
        )));
        self.transition(SessionState::Scanning);
        Ok(())
    }

    /// End discovery; the registry keeps everything seen so far.
    pub async fn stop_scanning(&mut self) -> Result<()> {
        if !self.scanner.is_scanning() {
            return Ok(());
        }

        // Stopping the scanner drops the channel sender, so the pump drains
        // what is queued and exits on its own.
        self.scanner.stop().await?;
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
        self.transition(SessionState::Stopped);
        Ok(())
    }

    /// Connect to the device at `index`, subscribe to heart rate
    /// notifications, and block until the stop handle fires or the device
    /// goes away.
    pub async fn connect_to_device(&mut self, index: u32) -> Result<(), SessionError> {
        let identity = {
            let registry = self.registry.lock().unwrap();
            select_device(&registry, index)?
        };

        self.transition(SessionState::Connecting);
        let connected = match self.connection.connect(&identity).await {
            Ok(connected) => connected,
            Err(err) => {
                self.transition(SessionState::Stopped);
                return Err(err);
            }
        };
        println!("Connected to device: {identity}");

        let mut notifications = match connected.peripheral.notifications().await {
            Ok(stream) => stream,
            Err(err) => {
                self.transition(SessionState::Stopped);
                return Err(SessionError::NotificationStream(err));
            }
        };

        println!("Subscribed to Heart Rate Measurement notifications. Press Enter to stop.");
        self.transition(SessionState::Subscribed);

        loop {
            if self.stop.is_stopped() {
                info!("Subscription stop requested");
                break;
            }
            match time::timeout(self.poll_interval, notifications.next()).await {
                // Poll tick elapsed; go back and re-check the stop flag.
                Err(_) => continue,
                Ok(None) => {
                    println!("Device stopped sending notifications.");
                    break;
                }
                Ok(Some(notification)) => {
                    if notification.uuid == connected.characteristic.uuid {
                        self.pipeline.process(&notification.value);
                    }
                }
            }
        }

        if let Err(err) = connected.peripheral.disconnect().await {
            debug!("Disconnect failed: {err}");
        }
        self.transition(SessionState::Terminated);
        Ok(())
    }

    fn transition(&mut self, state: SessionState) {
        debug!("Session state {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::osc::message_text;

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingSink {
        fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl MessageSink for RecordingSink {
        fn send(&mut self, measurement: &crate::domain::models::HeartRateMeasurement) -> Result<()> {
            self.sent.lock().unwrap().push(message_text(measurement));
            Ok(())
        }
    }

    fn identity(address: u64) -> DeviceIdentity {
        DeviceIdentity::new(address, None)
    }

    #[test]
    fn pipeline_forwards_only_changed_values() {
        let sink = RecordingSink::default();
        let mut pipeline = MeasurementPipeline::new(sink.clone());

        pipeline.process(&[0x00, 72]);
        pipeline.process(&[0x00, 72]);
        pipeline.process(&[0x01, 75, 0x00]);

        assert_eq!(sink.messages(), vec!["Heart Rate 72", "Heart Rate 75"]);
    }

    #[test]
    fn pipeline_drops_undecodable_payloads() {
        let sink = RecordingSink::default();
        let mut pipeline = MeasurementPipeline::new(sink.clone());

        pipeline.process(&[]);
        pipeline.process(&[0x01, 72]);

        assert!(sink.messages().is_empty());
    }

    #[test]
    fn selection_fails_before_any_radio_work() {
        let mut registry = DeviceRegistry::new();
        registry.observe(identity(0xA));

        assert!(select_device(&registry, 1).is_ok());
        assert!(matches!(
            select_device(&registry, 2),
            Err(SessionError::InvalidSelection)
        ));
    }

    #[tokio::test]
    async fn pump_registers_unique_devices_in_arrival_order() {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
        let pump = tokio::spawn(pump_advertisements(events_rx, Arc::clone(&registry)));

        for address in [0xA, 0xB, 0xA] {
            events_tx
                .send(Advertisement {
                    identity: identity(address),
                    rssi: Some(-60),
                })
                .unwrap();
        }
        drop(events_tx);
        pump.await.unwrap();

        let registry = registry.lock().unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve(1).unwrap().address, 0xA);
        assert_eq!(registry.resolve(2).unwrap().address, 0xB);
    }

    #[tokio::test]
    async fn discovery_to_forwarding_round_trip() {
        // Advertisements A, B, A arrive while scanning.
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
        let pump = tokio::spawn(pump_advertisements(events_rx, Arc::clone(&registry)));
        for address in [0xA, 0xB, 0xA] {
            events_tx
                .send(Advertisement {
                    identity: identity(address),
                    rssi: None,
                })
                .unwrap();
        }
        drop(events_tx);
        pump.await.unwrap();

        // The operator picks index 2.
        let selected = select_device(&registry.lock().unwrap(), 2).unwrap();
        assert_eq!(selected.address, 0xB);

        // Notifications: 72, 72 again, then 75.
        let sink = RecordingSink::default();
        let mut pipeline = MeasurementPipeline::new(sink.clone());
        pipeline.process(&[0x00, 72]);
        pipeline.process(&[0x00, 72]);
        pipeline.process(&[0x00, 75]);

        assert_eq!(sink.messages(), vec!["Heart Rate 72", "Heart Rate 75"]);
    }
}

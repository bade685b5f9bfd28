//! In-memory BLE stack for driving the manager in tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use safewalk_ble::{
    AlwaysGranted, BleConfig, BleError, BleEvent, BleTransport, BluetoothManager, Capability,
    PermissionGate, PermissionRequester, PermissionStatus, Peripheral, Platform, ScanEvent,
};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub device_id: String,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub payload: Vec<u8>,
}

pub struct FakeTransport {
    feed_tx: mpsc::UnboundedSender<ScanEvent>,
    feed_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ScanEvent>>,
    pub fail_scan_start: Mutex<bool>,
    pub fail_connect: Mutex<HashSet<String>>,
    pub fail_discovery: Mutex<HashSet<String>>,
    /// Discovery for these ids never completes
    pub stall_discovery: Mutex<HashSet<String>>,
    pub reject_writes: Mutex<bool>,
    connected: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    writes: Mutex<Vec<RecordedWrite>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            feed_tx,
            feed_rx: tokio::sync::Mutex::new(feed_rx),
            fail_scan_start: Mutex::new(false),
            fail_connect: Mutex::new(HashSet::new()),
            fail_discovery: Mutex::new(HashSet::new()),
            stall_discovery: Mutex::new(HashSet::new()),
            reject_writes: Mutex::new(false),
            connected: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
        })
    }

    /// Queues a discovery report for the running (or next) scan
    pub fn report(&self, event: ScanEvent) {
        self.feed_tx.send(event).unwrap();
    }

    pub fn report_named(&self, id: &str, name: &str) {
        self.report(ScanEvent::Discovered(peripheral(id, name)));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn link_up(&self, id: &str) -> bool {
        self.connected.lock().unwrap().contains(id)
    }

    /// Simulates the peripheral going away without the manager noticing
    pub fn drop_link(&self, id: &str) {
        self.connected.lock().unwrap().remove(id);
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl BleTransport for FakeTransport {
    async fn discover(
        &self,
        events: mpsc::Sender<ScanEvent>,
        cancel: CancellationToken,
    ) -> Result<(), BleError> {
        self.log("discover".to_string());
        if *self.fail_scan_start.lock().unwrap() {
            return Err(BleError::Scan("adapter powered off".to_string()));
        }
        let mut feed = self.feed_rx.lock().await;
        loop {
            tokio::select! {
                biased;
                Some(event) = feed.recv() => {
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        Ok(())
    }

    async fn connect(&self, peripheral: &Peripheral) -> Result<(), BleError> {
        self.log(format!("connect:{}", peripheral.id));
        if self.fail_connect.lock().unwrap().contains(&peripheral.id) {
            return Err(BleError::Connect("peripheral refused".to_string()));
        }
        self.connected.lock().unwrap().insert(peripheral.id.clone());
        Ok(())
    }

    async fn discover_services(
        &self,
        peripheral: &Peripheral,
        service_uuid: Uuid,
        _characteristic_uuid: Uuid,
    ) -> Result<(), BleError> {
        self.log(format!("discover_services:{}", peripheral.id));
        if self.fail_discovery.lock().unwrap().contains(&peripheral.id) {
            return Err(BleError::ServiceNotFound(service_uuid.to_string()));
        }
        let stall = self.stall_discovery.lock().unwrap().contains(&peripheral.id);
        if stall {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn disconnect(&self, peripheral: &Peripheral) -> Result<(), BleError> {
        self.log(format!("disconnect:{}", peripheral.id));
        self.connected.lock().unwrap().remove(&peripheral.id);
        Ok(())
    }

    async fn write_with_response(
        &self,
        peripheral: &Peripheral,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        data: &[u8],
    ) -> Result<(), BleError> {
        self.log(format!("write:{}", peripheral.id));
        if !self.link_up(&peripheral.id) {
            return Err(BleError::NotConnected(peripheral.id.clone()));
        }
        if *self.reject_writes.lock().unwrap() {
            return Err(BleError::Write("write rejected by peripheral".to_string()));
        }
        self.writes.lock().unwrap().push(RecordedWrite {
            device_id: peripheral.id.clone(),
            service_uuid,
            characteristic_uuid,
            payload: data.to_vec(),
        });
        Ok(())
    }

    async fn is_connected(&self, peripheral: &Peripheral) -> bool {
        self.link_up(&peripheral.id)
    }
}

pub fn peripheral(id: &str, name: &str) -> Peripheral {
    Peripheral::new(id, format!("AA:BB:CC:00:00:{:0>2}", id), Some(name.to_string()), Some(-60))
}

pub fn manager(transport: &Arc<FakeTransport>) -> BluetoothManager<FakeTransport> {
    manager_with(transport, BleConfig::default())
}

pub fn manager_with(
    transport: &Arc<FakeTransport>,
    config: BleConfig,
) -> BluetoothManager<FakeTransport> {
    let gate = PermissionGate::new(Platform::Desktop, Box::new(AlwaysGranted));
    BluetoothManager::new(transport.clone(), gate, config)
}

/// An Android 12 host whose user declines every prompt
pub struct DenyingRequester;

#[async_trait::async_trait]
impl PermissionRequester for DenyingRequester {
    async fn api_level(&self) -> Result<u32, BleError> {
        Ok(31)
    }

    async fn request(
        &self,
        capabilities: &[Capability],
    ) -> Result<Vec<(Capability, PermissionStatus)>, BleError> {
        Ok(capabilities
            .iter()
            .map(|c| (*c, PermissionStatus::Denied))
            .collect())
    }
}

pub fn denied_manager(transport: &Arc<FakeTransport>) -> BluetoothManager<FakeTransport> {
    let gate = PermissionGate::new(Platform::Android, Box::new(DenyingRequester));
    BluetoothManager::new(transport.clone(), gate, BleConfig::default())
}

/// Waits until an event matching `pred` arrives, returning it.
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<BleEvent>, pred: F) -> BleEvent
where
    F: Fn(&BleEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

pub fn found(name: &str) -> impl Fn(&BleEvent) -> bool + '_ {
    move |event| matches!(event, BleEvent::DeviceFound(p) if p.local_name() == Some(name))
}

pub fn names(devices: &[Peripheral]) -> Vec<String> {
    devices
        .iter()
        .filter_map(|p| p.local_name().map(str::to_string))
        .collect()
}

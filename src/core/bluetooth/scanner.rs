use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::constants::SCAN_EVENT_QUEUE_CAPACITY;
use crate::core::bluetooth::events::{BleEvent, EventEmitter};
use crate::core::bluetooth::registry::PeripheralRegistry;
use crate::core::bluetooth::transport::BleTransport;
use crate::core::bluetooth::types::{Peripheral, ScanEvent};

pub struct BluetoothScanner<T: BleTransport> {
    transport: Arc<T>,
    registry: Arc<Mutex<PeripheralRegistry>>,
    emitter: EventEmitter,
    cancel_token: CancellationToken,
    scan_task_handle: Option<JoinHandle<()>>,
}

impl<T: BleTransport> BluetoothScanner<T> {
    pub fn new(
        transport: Arc<T>,
        registry: Arc<Mutex<PeripheralRegistry>>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            transport,
            registry,
            emitter,
            cancel_token: CancellationToken::new(),
            scan_task_handle: None,
        }
    }

    /// Starts continuous discovery with an empty registry. A scan that is
    /// already running is stopped first.
    pub async fn start_scan(&mut self) {
        if self.scan_task_handle.is_some() {
            self.stop_scan().await;
        }
        Self::lock(&self.registry).clear();

        // Announce before the task can report anything
        self.emitter.emit(BleEvent::ScanStarted);

        self.cancel_token = CancellationToken::new();
        let cancel_token_for_task = self.cancel_token.clone();
        let transport_for_task = self.transport.clone();
        let registry_for_task = self.registry.clone();
        let emitter_for_task = self.emitter.clone();

        let handle = tokio::spawn(async move {
            Self::internal_scan_task(
                transport_for_task,
                registry_for_task,
                emitter_for_task,
                cancel_token_for_task,
            )
            .await;
        });
        self.scan_task_handle = Some(handle);
        info!("Device scan task started.");
    }

    /// Feeds the transport's discovery reports into the registry, one at a time.
    async fn internal_scan_task(
        transport: Arc<T>,
        registry: Arc<Mutex<PeripheralRegistry>>,
        emitter: EventEmitter,
        cancel_token: CancellationToken,
    ) {
        let (tx, mut rx) = mpsc::channel(SCAN_EVENT_QUEUE_CAPACITY);

        let producer = transport.discover(tx, cancel_token);
        let consumer = async {
            while let Some(event) = rx.recv().await {
                Self::handle_scan_event(&registry, &emitter, event);
            }
        };
        let (result, ()) = tokio::join!(producer, consumer);

        if let Err(e) = result {
            error!("Bluetooth scan failed: {}", e);
            emitter.emit(BleEvent::ScanError(e.to_string()));
        }
        info!("Scan task finished.");
    }

    fn handle_scan_event(
        registry: &Mutex<PeripheralRegistry>,
        emitter: &EventEmitter,
        event: ScanEvent,
    ) {
        match event {
            ScanEvent::Error(message) => {
                // Scan errors are transient; keep scanning.
                warn!("Scan error: {}", message);
                emitter.emit(BleEvent::ScanError(message));
            }
            ScanEvent::Discovered(peripheral) => {
                if peripheral.local_name().is_none() {
                    debug!("Ignoring unnamed device {}", peripheral.id);
                    return;
                }
                let added = Self::lock(registry).record(peripheral.clone());
                if added {
                    info!(
                        "Found device: Name: {}, ID: {}, Address: {}, RSSI: {:?}",
                        peripheral.display_name(),
                        peripheral.id,
                        peripheral.address,
                        peripheral.rssi
                    );
                    emitter.emit(BleEvent::DeviceFound(peripheral));
                } else {
                    debug!("Duplicate report for {}", peripheral.display_name());
                }
            }
        }
    }

    /// Halts discovery and waits for the scan task. The registry is kept.
    pub async fn stop_scan(&mut self) {
        info!("Stopping Bluetooth scan.");
        self.cancel_token.cancel();

        let Some(handle) = self.scan_task_handle.take() else {
            info!("No active scan task handle found to wait for.");
            return;
        };
        info!("Waiting for scan task to finish...");
        match handle.await {
            Ok(()) => info!("Scan task finished successfully after cancellation."),
            Err(e) if e.is_cancelled() => info!("Scan task was cancelled successfully."),
            Err(e) => error!("Scan task finished with an unexpected join error: {:?}", e),
        }
        self.emitter.emit(BleEvent::ScanStopped);
    }

    pub fn is_scanning(&self) -> bool {
        self.scan_task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Snapshot of the registry in discovery order
    pub fn devices(&self) -> Vec<Peripheral> {
        Self::lock(&self.registry).devices().to_vec()
    }

    fn lock(registry: &Mutex<PeripheralRegistry>) -> std::sync::MutexGuard<'_, PeripheralRegistry> {
        registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: BleTransport> Drop for BluetoothScanner<T> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

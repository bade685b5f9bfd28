//! Bluetooth manager for the SafeWalk BLE core
//! This module provides the main interface for bluetooth operations

use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::{error, info};
use tokio::sync::broadcast;

use crate::config::ble_config::BleConfig;
use crate::core::bluetooth::bluest_transport::BluestTransport;
use crate::core::bluetooth::channel::MessageChannel;
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::error::{BleError, SendError};
use crate::core::bluetooth::events::{BleEvent, EventEmitter};
use crate::core::bluetooth::permissions::PermissionGate;
use crate::core::bluetooth::registry::PeripheralRegistry;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::transport::BleTransport;
use crate::core::bluetooth::types::{ConnectionState, Peripheral};

/// Manages Bluetooth operations
pub struct BluetoothManager<T: BleTransport> {
    config: BleConfig,
    /// Permission gate for the host platform
    permission_gate: PermissionGate,
    /// Bluetooth scanner
    scanner: BluetoothScanner<T>,
    /// Connection manager, sole owner of the session
    connection_manager: ConnectionManager<T>,
    /// Message channel
    channel: MessageChannel<T>,
    emitter: EventEmitter,
    /// Outcome of the last permission request, `None` until one was made
    permissions_granted: Option<bool>,
}

impl BluetoothManager<BluestTransport> {
    /// Creates a manager on top of the system's default adapter
    pub async fn with_default_adapter(
        config: BleConfig,
        permission_gate: PermissionGate,
    ) -> Result<Self> {
        let transport = BluestTransport::new().await?;
        Ok(Self::new(Arc::new(transport), permission_gate, config))
    }
}

impl<T: BleTransport> BluetoothManager<T> {
    pub fn new(transport: Arc<T>, permission_gate: PermissionGate, config: BleConfig) -> Self {
        let emitter = EventEmitter::new();
        let registry = Arc::new(Mutex::new(PeripheralRegistry::new()));

        let scanner = BluetoothScanner::new(transport.clone(), registry, emitter.clone());
        let connection_manager = ConnectionManager::new(
            transport.clone(),
            config.service_uuid,
            config.characteristic_uuid,
            config.reconnect_policy,
            emitter.clone(),
        );
        let channel = MessageChannel::new(
            transport,
            config.service_uuid,
            config.characteristic_uuid,
            config.max_payload_len,
            emitter.clone(),
        );

        Self {
            config,
            permission_gate,
            scanner,
            connection_manager,
            channel,
            emitter,
            permissions_granted: None,
        }
    }

    pub fn config(&self) -> &BleConfig {
        &self.config
    }

    /// Subscribes to the core's events
    pub fn subscribe(&self) -> broadcast::Receiver<BleEvent> {
        self.emitter.subscribe()
    }

    /// Resolves to true iff the platform granted everything BLE needs
    pub async fn request_permissions(&mut self) -> bool {
        let granted = self.permission_gate.request_permissions().await;
        info!(
            "Bluetooth permissions on {:?}: {}",
            self.permission_gate.platform(),
            if granted { "granted" } else { "denied" }
        );
        self.permissions_granted = Some(granted);
        granted
    }

    /// Fails once the platform has refused permissions. Before the first
    /// request the radio calls go through and the OS has the last word.
    fn check_permissions(&self) -> Result<(), BleError> {
        match self.permissions_granted {
            Some(false) => Err(BleError::PermissionDenied(format!(
                "Bluetooth permissions were denied on {:?}",
                self.permission_gate.platform()
            ))),
            _ => Ok(()),
        }
    }

    /// Starts discovery with a fresh registry
    pub async fn start_scan(&mut self) {
        if let Err(e) = self.check_permissions() {
            error!("Not starting scan: {}", e);
            self.emitter.emit(BleEvent::ScanError(e.to_string()));
            return;
        }
        self.scanner.start_scan().await
    }

    pub async fn stop_scan(&mut self) {
        self.scanner.stop_scan().await
    }

    pub fn is_scanning(&self) -> bool {
        self.scanner.is_scanning()
    }

    /// Discovered devices, in discovery order
    pub fn devices(&self) -> Vec<Peripheral> {
        self.scanner.devices()
    }

    pub fn find_device(&self, name: &str) -> Option<Peripheral> {
        self.devices()
            .into_iter()
            .find(|p| p.local_name() == Some(name))
    }

    /// Connects to the peripheral. Failures are logged and leave no session.
    pub async fn connect(&mut self, peripheral: &Peripheral) -> Result<(), BleError> {
        if let Err(e) = self.check_permissions() {
            error!("Not connecting to {}: {}", peripheral.id, e);
            return Err(e);
        }
        self.connection_manager.connect(peripheral).await?;

        if self.config.stop_scan_on_connect && self.scanner.is_scanning() {
            self.scanner.stop_scan().await;
        }
        info!("Device successfully connected and state stored in the main service.");
        Ok(())
    }

    /// Connects to a discovered device with the given ID
    pub async fn connect_device(&mut self, device_id: &str) -> Result<(), BleError> {
        let peripheral = self
            .devices()
            .into_iter()
            .find(|p| p.id == device_id)
            .ok_or_else(|| {
                let e = BleError::Connect(format!("Device not found with ID: {}", device_id));
                error!("{}", e);
                e
            })?;
        self.connect(&peripheral).await
    }

    /// Disconnects from the currently connected device, if any
    pub async fn disconnect(&mut self) -> Result<(), BleError> {
        self.connection_manager.disconnect().await
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_manager.state()
    }

    /// Returns the currently connected device
    pub fn connected_device(&self) -> Option<Peripheral> {
        self.connection_manager.connected_device().cloned()
    }

    /// Checks if a device is currently connected.
    pub async fn is_connected(&self) -> bool {
        self.connection_manager.is_connected().await
    }

    /// Sends a text message to the connected peripheral. The outcome is
    /// read back through `last_send_error`.
    pub async fn send_message(&mut self, peripheral: &Peripheral, message: &str) {
        if let Err(e) = self.check_permissions() {
            self.channel.reject(e);
            return;
        }
        let session = self.connection_manager.session();
        self.channel
            .send_in_session(session, peripheral, message)
            .await
    }

    /// Error of the most recent `send_message`, `None` after a success
    pub fn last_send_error(&self) -> Option<SendError> {
        self.channel.last_error().cloned()
    }
}

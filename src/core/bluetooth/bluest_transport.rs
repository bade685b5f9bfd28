//! `BleTransport` backed by the bluest crate
//! This module talks to the OS Bluetooth stack: scanning, connecting,
//! service discovery and characteristic writes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use bluest::{Adapter, Characteristic, Device, Uuid};
use futures_util::StreamExt;
use log::{debug, info, warn};
use regex::Regex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::transport::BleTransport;
use crate::core::bluetooth::types::{Peripheral, ScanEvent};

static MAC_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").expect("MAC address pattern is valid")
});

pub struct BluestTransport {
    adapter: Adapter,
    /// Platform handles of discovered devices, keyed by peripheral id
    devices: Arc<Mutex<HashMap<String, Device>>>,
    /// Resolved message characteristics, keyed by peripheral id
    characteristics: Arc<Mutex<HashMap<String, Characteristic>>>,
}

impl BluestTransport {
    /// Opens the default adapter and waits until it is powered.
    pub async fn new() -> Result<Self, BleError> {
        let adapter = Adapter::default()
            .await
            .ok_or(BleError::AdapterUnavailable)?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        Ok(Self {
            adapter,
            devices: Arc::new(Mutex::new(HashMap::new())),
            characteristics: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn devices(&self) -> MutexGuard<'_, HashMap<String, Device>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn characteristics(&self) -> MutexGuard<'_, HashMap<String, Characteristic>> {
        self.characteristics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn device(&self, peripheral: &Peripheral) -> Option<Device> {
        self.devices().get(&peripheral.id).cloned()
    }

    fn extract_mac_address(device_id_str: &str) -> Option<String> {
        MAC_ADDRESS
            .find_iter(device_id_str)
            .last()
            .map(|m| m.as_str().to_uppercase())
    }

    async fn resolve_characteristic(
        device: &Device,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<Characteristic, BleError> {
        let service = device
            .discover_services_with_uuid(service_uuid)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BleError::ServiceNotFound(service_uuid.to_string()))?;
        info!("Found message service: {}", service.uuid());

        let characteristic = service
            .discover_characteristics_with_uuid(characteristic_uuid)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BleError::CharacteristicNotFound(characteristic_uuid.to_string()))?;
        info!("Found message characteristic: {}", characteristic.uuid());
        Ok(characteristic)
    }
}

#[async_trait::async_trait]
impl BleTransport for BluestTransport {
    async fn discover(
        &self,
        events: mpsc::Sender<ScanEvent>,
        cancel: CancellationToken,
    ) -> Result<(), BleError> {
        info!("Starting bluetooth scan");
        {
            let characteristics = self.characteristics();
            let mut devices = self.devices();
            let pruned = prune_stale_devices(&mut devices, &characteristics);
            debug!("Dropped {} device handles from the previous scan", pruned);
        }
        let mut scan_stream = self
            .adapter
            .scan(&[])
            .await
            .map_err(|e| BleError::Scan(e.to_string()))?;

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    let Some(discovered) = result else {
                        info!("Bluetooth scan stream has ended.");
                        break;
                    };
                    let device = discovered.device;
                    let id = device.id().to_string();
                    let name = discovered
                        .adv_data
                        .local_name
                        .or_else(|| device.name().ok());
                    let address = Self::extract_mac_address(&id).unwrap_or_else(|| id.clone());
                    debug!("Found device - ID: {}, Name: {:?}, RSSI: {:?}", id, name, discovered.rssi);

                    self.devices().insert(id.clone(), device);
                    let peripheral = Peripheral::new(id, address, name, discovered.rssi);
                    if events.send(ScanEvent::Discovered(peripheral)).await.is_err() {
                        debug!("Scan event receiver dropped, ending scan");
                        break;
                    }
                }
                _ = cancel.cancelled() => {
                    break;
                }
            }
        }
        Ok(())
    }

    async fn connect(&self, peripheral: &Peripheral) -> Result<(), BleError> {
        let device = self
            .device(peripheral)
            .ok_or_else(|| BleError::Connect(format!("Device not found with ID: {}", peripheral.id)))?;

        if device.is_connected().await {
            info!("Device {} already linked at the OS level", peripheral.id);
            return Ok(());
        }
        info!("Initiating connection to {}...", peripheral.id);
        self.adapter
            .connect_device(&device)
            .await
            .map_err(|e| BleError::Connect(e.to_string()))
    }

    async fn discover_services(
        &self,
        peripheral: &Peripheral,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<(), BleError> {
        let device = self
            .device(peripheral)
            .ok_or_else(|| BleError::NotConnected(peripheral.id.clone()))?;
        info!("Connection successful, discovering services...");
        let characteristic =
            Self::resolve_characteristic(&device, service_uuid, characteristic_uuid).await?;
        self.characteristics()
            .insert(peripheral.id.clone(), characteristic);
        Ok(())
    }

    async fn disconnect(&self, peripheral: &Peripheral) -> Result<(), BleError> {
        self.characteristics().remove(&peripheral.id);
        let Some(device) = self.device(peripheral) else {
            warn!("Disconnect requested for unknown device {}", peripheral.id);
            return Ok(());
        };
        if device.is_connected().await {
            info!("Disconnecting from device {}", peripheral.id);
            self.adapter.disconnect_device(&device).await?;
            info!("Successfully disconnected");
        } else {
            info!("Device {} not connected", peripheral.id);
        }
        Ok(())
    }

    async fn write_with_response(
        &self,
        peripheral: &Peripheral,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        data: &[u8],
    ) -> Result<(), BleError> {
        let device = self
            .device(peripheral)
            .ok_or_else(|| BleError::NotConnected(peripheral.id.clone()))?;
        if !device.is_connected().await {
            return Err(BleError::NotConnected(peripheral.id.clone()));
        }

        let cached = self
            .characteristics()
            .get(&peripheral.id)
            .filter(|c| c.uuid() == characteristic_uuid)
            .cloned();
        let characteristic = match cached {
            Some(characteristic) => characteristic,
            None => Self::resolve_characteristic(&device, service_uuid, characteristic_uuid).await?,
        };

        // bluest writes with response unless asked otherwise
        characteristic
            .write(data)
            .await
            .map_err(|e| BleError::Write(e.to_string()))
    }

    async fn is_connected(&self, peripheral: &Peripheral) -> bool {
        match self.device(peripheral) {
            Some(device) => device.is_connected().await,
            None => false,
        }
    }
}

/// Drops every device handle that has no resolved characteristic, i.e.
/// everything except the open session. Returns how many were dropped.
fn prune_stale_devices<D, C>(
    devices: &mut HashMap<String, D>,
    characteristics: &HashMap<String, C>,
) -> usize {
    let live: HashSet<&String> = characteristics.keys().collect();
    let before = devices.len();
    devices.retain(|id, _| live.contains(id));
    before - devices.len()
}

//! Application state management
//! This module defines the process-wide owner of the Bluetooth manager.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::sync::Mutex;

use crate::config::BleConfig;
use crate::core::BluetoothManager;
use crate::core::bluetooth::{
    AlwaysGranted, BleTransport, BluestTransport, PermissionGate, PermissionRequester, Platform,
};

/// Global application state
pub struct AppState<T: BleTransport = BluestTransport> {
    /// The Bluetooth manager instance. Callers go through the mutex, so
    /// connect, disconnect and send never interleave.
    pub bluetooth_manager: Arc<Mutex<BluetoothManager<T>>>,
}

impl AppState<BluestTransport> {
    /// Creates the state from the config stored in `config_dir`, using the
    /// default adapter and the given platform permission hook. Logging is
    /// installed at the config's `log_level` unless a logger already exists.
    pub async fn new(config_dir: &Path, requester: Box<dyn PermissionRequester>) -> Result<Self> {
        let config = BleConfig::load_config(config_dir).await?;
        crate::setup_logging(config.log_level_filter());
        let gate = PermissionGate::new(Platform::current(), requester);
        info!("Initializing BluetoothManager...");
        let manager = BluetoothManager::with_default_adapter(config, gate).await?;
        Ok(Self::from_manager(manager))
    }

    /// Desktop variant: no runtime permission model.
    pub async fn new_desktop(config_dir: &Path) -> Result<Self> {
        Self::new(config_dir, Box::new(AlwaysGranted)).await
    }
}

impl<T: BleTransport> AppState<T> {
    pub fn from_manager(manager: BluetoothManager<T>) -> Self {
        Self {
            bluetooth_manager: Arc::new(Mutex::new(manager)),
        }
    }

    /// Gets a reference to the Bluetooth manager
    pub fn get_bluetooth_manager_arc(&self) -> Arc<Mutex<BluetoothManager<T>>> {
        self.bluetooth_manager.clone()
    }
}

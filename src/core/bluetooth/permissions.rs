//! Permission gate for BLE scanning and connecting
//! Decides which runtime capabilities the host platform needs and asks
//! the platform for them.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::ANDROID_MODERN_PERMISSIONS_API_LEVEL;
use crate::core::bluetooth::error::BleError;

/// Host platform family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Android,
    Ios,
    Desktop,
}

impl Platform {
    /// The platform this library was compiled for
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else {
            Platform::Desktop
        }
    }
}

/// A runtime capability the OS can grant or refuse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    BluetoothScan,
    BluetoothConnect,
    FineLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Blocked,
    Unavailable,
}

/// Platform hook that shows the OS permission dialogs.
#[async_trait::async_trait]
pub trait PermissionRequester: Send + Sync {
    /// OS API level (only consulted on Android)
    async fn api_level(&self) -> Result<u32, BleError>;

    /// Requests every capability and reports the status of each.
    async fn request(
        &self,
        capabilities: &[Capability],
    ) -> Result<Vec<(Capability, PermissionStatus)>, BleError>;
}

/// Requester for platforms that have no runtime permission model.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

#[async_trait::async_trait]
impl PermissionRequester for AlwaysGranted {
    async fn api_level(&self) -> Result<u32, BleError> {
        Ok(0)
    }

    async fn request(
        &self,
        capabilities: &[Capability],
    ) -> Result<Vec<(Capability, PermissionStatus)>, BleError> {
        Ok(capabilities
            .iter()
            .map(|c| (*c, PermissionStatus::Granted))
            .collect())
    }
}

/// Capabilities Android needs at the given API level
pub fn required_capabilities(api_level: u32) -> &'static [Capability] {
    if api_level < ANDROID_MODERN_PERMISSIONS_API_LEVEL {
        &[Capability::FineLocation]
    } else {
        &[
            Capability::BluetoothScan,
            Capability::BluetoothConnect,
            Capability::FineLocation,
        ]
    }
}

pub struct PermissionGate {
    platform: Platform,
    requester: Box<dyn PermissionRequester>,
}

impl PermissionGate {
    pub fn new(platform: Platform, requester: Box<dyn PermissionRequester>) -> Self {
        Self {
            platform,
            requester,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Resolves to true iff every capability the platform needs was granted.
    /// Failures of the platform hook count as a denial.
    pub async fn request_permissions(&self) -> bool {
        if self.platform != Platform::Android {
            return true;
        }

        let api_level = match self.requester.api_level().await {
            Ok(level) => level,
            Err(e) => {
                error!("Failed to read API level: {}", e);
                return false;
            }
        };
        let required = required_capabilities(api_level);
        info!("Requesting {:?} at API level {}", required, api_level);

        let results = match self.requester.request(required).await {
            Ok(results) => results,
            Err(e) => {
                error!("Permission request failed: {}", e);
                return false;
            }
        };

        let granted = required.iter().all(|capability| {
            results
                .iter()
                .any(|(c, status)| c == capability && *status == PermissionStatus::Granted)
        });
        if !granted {
            warn!("Bluetooth permissions not granted: {:?}", results);
        }
        granted
    }
}

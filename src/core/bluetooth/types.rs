//! Defines shared data structures for the Bluetooth module.

use serde::Serialize;

/// Represents a discovered Bluetooth peripheral
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Peripheral {
    /// Platform-specific unique identifier, used as the handle for connect operations
    pub id: String,
    /// The address of the device (MAC address on most platforms, the id itself where the OS hides it)
    pub address: String,
    /// The advertised local name, if any
    pub name: Option<String>,
    /// The signal strength (RSSI) at discovery time
    pub rssi: Option<i16>,
}

impl Peripheral {
    /// Creates a new Peripheral instance
    pub fn new(id: impl Into<String>, address: impl Into<String>, name: Option<String>, rssi: Option<i16>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            name,
            rssi,
        }
    }

    /// The advertised name, treating an empty name as absent
    pub fn local_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// Returns true if both values refer to the same platform device
    pub fn same_device(&self, other: &Peripheral) -> bool {
        self.id == other.id
    }

    /// Name for log lines
    pub fn display_name(&self) -> &str {
        self.local_name().unwrap_or("Unknown")
    }
}

/// The process's single active connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The connected peripheral
    pub peripheral: Peripheral,
    /// Set once service/characteristic discovery has completed
    pub services_discovered: bool,
}

impl Session {
    pub(crate) fn pending(peripheral: Peripheral) -> Self {
        Self {
            peripheral,
            services_discovered: false,
        }
    }

    /// True once the session can carry messages
    pub fn is_ready(&self) -> bool {
        self.services_discovered
    }
}

/// Lifecycle of the connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
}

/// A single report from the platform discovery stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Discovered(Peripheral),
    Error(String),
}

//! Bluetooth functionality for the SafeWalk BLE core
//! This module handles all bluetooth operations including permission
//! gating, scanning, connecting, and sending messages to a peripheral.

mod bluest_transport;
mod channel;
mod connection;
pub mod constants;
mod error;
mod events;
mod manager;
mod permissions;
mod registry;
mod scanner;
mod transport;
mod types;

// Re-export types that should be publicly accessible
pub use bluest_transport::BluestTransport;
pub use channel::{MessageChannel, decode_payload, encode_payload};
pub use connection::ConnectionManager;
pub use error::{BleError, SendError, SendErrorKind};
pub use events::{BleEvent, EventEmitter};
pub use manager::BluetoothManager;
pub use permissions::{
    AlwaysGranted, Capability, PermissionGate, PermissionRequester, PermissionStatus, Platform,
    required_capabilities,
};
pub use registry::PeripheralRegistry;
pub use scanner::BluetoothScanner;
pub use transport::BleTransport;
pub use types::{ConnectionState, Peripheral, ScanEvent, Session};

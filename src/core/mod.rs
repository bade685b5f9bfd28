//! Core functionality for the SafeWalk BLE bridge
//! This module contains the Bluetooth session core

pub mod bluetooth;

// Re-export commonly used types
pub use bluetooth::BluetoothManager;

//! Constants used throughout the Bluetooth core
//! This module contains the fixed GATT identifiers and the limits the
//! session manager works with.

use uuid::Uuid;

/// The UUID of the SafeWalk message service
pub const UUID_MESSAGE_SERVICE: Uuid = Uuid::from_u128(0xd78a31fe_e14f_4f6a_a107_790ab0d58f27);

/// The UUID of the characteristic messages are written to
pub const UUID_MESSAGE_CHAR: Uuid = Uuid::from_u128(0xebe6204c_c1ee_4d09_97b8_f77f360f7372);

/// First Android API level with the split BLUETOOTH_SCAN / BLUETOOTH_CONNECT permissions
pub const ANDROID_MODERN_PERMISSIONS_API_LEVEL: u32 = 31;

/// Largest attribute value a single GATT write can carry
pub const MAX_ATTRIBUTE_VALUE_LEN: usize = 512;

/// Capacity of the discovery event queue between transport and registry
pub const SCAN_EVENT_QUEUE_CAPACITY: usize = 64;

/// Capacity of the broadcast channel used for `BleEvent`s
pub const EVENT_CHANNEL_CAPACITY: usize = 128;

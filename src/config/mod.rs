pub mod ble_config;

pub use ble_config::{BleConfig, ReconnectPolicy};

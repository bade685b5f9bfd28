//! SafeWalk BLE library
//! Bluetooth Low Energy session core: permission gating, discovery, a
//! single exclusive connection and text messaging over GATT.

// Module declarations
pub mod config;
pub mod core;
pub mod logging;
pub mod state;

use log::LevelFilter;

pub use crate::config::{BleConfig, ReconnectPolicy};
pub use crate::core::bluetooth::*;
pub use crate::state::AppState;

/// Installs the forwarding logger at `level`. With `RUST_LOG` set, plain
/// `env_logger` is used instead so developers get their usual filters.
/// Returns false if a logger was already installed.
pub fn setup_logging(level: LevelFilter) -> bool {
    let installed = if std::env::var_os("RUST_LOG").is_some() {
        env_logger::try_init().is_ok()
    } else {
        logging::ForwardingLogger::init(level).is_ok()
    };
    if installed {
        log::info!("Logging initialized at {}", log::max_level());
    }
    installed
}

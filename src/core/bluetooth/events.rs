//! Events emitted by the Bluetooth core
//! Host code subscribes to these instead of polling the manager.

use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::bluetooth::constants::EVENT_CHANNEL_CAPACITY;
use crate::core::bluetooth::error::SendError;
use crate::core::bluetooth::types::Peripheral;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum BleEvent {
    ScanStarted,
    DeviceFound(Peripheral),
    ScanError(String),
    ScanStopped,
    Connecting(Peripheral),
    Connected(Peripheral),
    ConnectFailed { peripheral: Peripheral, reason: String },
    Disconnected(Peripheral),
    MessageSent { peripheral: Peripheral, message: String },
    SendFailed(SendError),
}

/// Cloneable handle for emitting `BleEvent`s
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<BleEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BleEvent> {
        self.tx.subscribe()
    }

    /// Emits an event. Having no subscribers is fine.
    pub fn emit(&self, event: BleEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("No subscribers for event {:?}", e.0);
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

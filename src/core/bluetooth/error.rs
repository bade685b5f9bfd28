//! Error types for the Bluetooth core.

use serde::Serialize;
use thiserror::Error;

/// Failures raised by the transport and the session components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BleError {
    #[error("No Bluetooth adapter found")]
    AdapterUnavailable,

    #[error("Bluetooth permission denied: {0}")]
    PermissionDenied(String),

    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(String),

    #[error("Device {0} is not connected")]
    NotConnected(String),

    #[error("Device {actual} does not match the connected device {expected}")]
    ConnectionMismatch { expected: String, actual: String },

    #[error("Already connected to {0}")]
    AlreadyConnected(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Platform error: {0}")]
    Platform(String),
}

impl From<bluest::Error> for BleError {
    fn from(e: bluest::Error) -> Self {
        BleError::Platform(e.to_string())
    }
}

/// Category of a failed send, as exposed through the last-error slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SendErrorKind {
    Permission,
    Connection,
    Write,
    Encoding,
}

/// The last transmission error observed by the message channel
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind:?} error: {message}")]
pub struct SendError {
    pub kind: SendErrorKind,
    pub message: String,
}

impl From<BleError> for SendError {
    fn from(e: BleError) -> Self {
        let kind = match &e {
            BleError::PermissionDenied(_) => SendErrorKind::Permission,
            BleError::AdapterUnavailable
            | BleError::Connect(_)
            | BleError::NotConnected(_)
            | BleError::ConnectionMismatch { .. }
            | BleError::AlreadyConnected(_) => SendErrorKind::Connection,
            BleError::Encoding(_) => SendErrorKind::Encoding,
            BleError::Scan(_)
            | BleError::ServiceNotFound(_)
            | BleError::CharacteristicNotFound(_)
            | BleError::Write(_)
            | BleError::Platform(_) => SendErrorKind::Write,
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

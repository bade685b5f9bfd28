//! Message channel
//! Encodes text messages and writes them to the message characteristic
//! of the connected peripheral. Failures are recorded, not returned.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{error, info};
use uuid::Uuid;

use crate::core::bluetooth::error::{BleError, SendError};
use crate::core::bluetooth::events::{BleEvent, EventEmitter};
use crate::core::bluetooth::transport::BleTransport;
use crate::core::bluetooth::types::{Peripheral, Session};

/// Encodes a message into the bytes written to the characteristic.
/// The payload is the base64 text of the UTF-8 message, with no framing.
pub fn encode_payload(message: &str, max_len: usize) -> Result<Vec<u8>, BleError> {
    let encoded = STANDARD.encode(message.as_bytes()).into_bytes();
    if encoded.len() > max_len {
        return Err(BleError::Encoding(format!(
            "encoded payload is {} bytes, a single write carries at most {}",
            encoded.len(),
            max_len
        )));
    }
    Ok(encoded)
}

/// Inverse of `encode_payload`, for receivers and tests.
pub fn decode_payload(payload: &[u8]) -> Result<String, BleError> {
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| BleError::Encoding(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BleError::Encoding(e.to_string()))
}

pub struct MessageChannel<T: BleTransport> {
    transport: Arc<T>,
    service_uuid: Uuid,
    characteristic_uuid: Uuid,
    max_payload_len: usize,
    emitter: EventEmitter,
    last_error: Option<SendError>,
}

impl<T: BleTransport> MessageChannel<T> {
    pub fn new(
        transport: Arc<T>,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        max_payload_len: usize,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            transport,
            service_uuid,
            characteristic_uuid,
            max_payload_len,
            emitter,
            last_error: None,
        }
    }

    /// Writes `message` to the given peripheral. The caller is responsible
    /// for the peripheral being the connected one.
    pub async fn send(&mut self, peripheral: &Peripheral, message: &str) {
        self.last_error = None;

        let result = match encode_payload(message, self.max_payload_len) {
            Ok(payload) => {
                self.transport
                    .write_with_response(
                        peripheral,
                        self.service_uuid,
                        self.characteristic_uuid,
                        &payload,
                    )
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("Message sent: {}", message);
                self.emitter.emit(BleEvent::MessageSent {
                    peripheral: peripheral.clone(),
                    message: message.to_string(),
                });
            }
            Err(e) => self.record_failure(e),
        }
    }

    /// Like `send`, but first checks that `peripheral` belongs to the open
    /// session. Mismatches are recorded without touching the radio.
    pub async fn send_in_session(
        &mut self,
        session: Option<&Session>,
        peripheral: &Peripheral,
        message: &str,
    ) {
        self.last_error = None;

        let check = match session {
            Some(session) if !session.is_ready() => {
                Err(BleError::NotConnected(session.peripheral.id.clone()))
            }
            Some(session) if !session.peripheral.same_device(peripheral) => {
                Err(BleError::ConnectionMismatch {
                    expected: session.peripheral.id.clone(),
                    actual: peripheral.id.clone(),
                })
            }
            Some(_) => Ok(()),
            None => Err(BleError::NotConnected(peripheral.id.clone())),
        };

        match check {
            Ok(()) => self.send(peripheral, message).await,
            Err(e) => self.record_failure(e),
        }
    }

    /// Records a send that was refused before it reached the channel.
    pub fn reject(&mut self, e: BleError) {
        self.last_error = None;
        self.record_failure(e);
    }

    fn record_failure(&mut self, e: BleError) {
        error!("Failed to send message: {}", e);
        let send_error = SendError::from(e);
        self.emitter.emit(BleEvent::SendFailed(send_error.clone()));
        self.last_error = Some(send_error);
    }

    /// Error of the most recent send, `None` if it succeeded
    pub fn last_error(&self) -> Option<&SendError> {
        self.last_error.as_ref()
    }
}

//! Bluetooth connection handling
//! This module owns the single session: connecting, service discovery
//! and disconnecting.

use std::sync::Arc;

use log::{error, info, warn};
use uuid::Uuid;

use crate::config::ble_config::ReconnectPolicy;
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::events::{BleEvent, EventEmitter};
use crate::core::bluetooth::transport::BleTransport;
use crate::core::bluetooth::types::{ConnectionState, Peripheral, Session};

/// Connection manager for the message peripheral
pub struct ConnectionManager<T: BleTransport> {
    transport: Arc<T>,
    service_uuid: Uuid,
    characteristic_uuid: Uuid,
    reconnect_policy: ReconnectPolicy,
    emitter: EventEmitter,
    state: ConnectionState,
    session: Option<Session>,
}

impl<T: BleTransport> ConnectionManager<T> {
    pub fn new(
        transport: Arc<T>,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        reconnect_policy: ReconnectPolicy,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            transport,
            service_uuid,
            characteristic_uuid,
            reconnect_policy,
            emitter,
            state: ConnectionState::Idle,
            session: None,
        }
    }

    /// Connects to the peripheral and discovers the message characteristic.
    /// The session only counts as connected once discovery has completed;
    /// on any failure, including the returned future being dropped, the
    /// manager is back to `Idle` with no session.
    pub async fn connect(&mut self, peripheral: &Peripheral) -> Result<(), BleError> {
        if let Some(current) = self.session.as_ref().map(|s| s.peripheral.clone()) {
            if current.same_device(peripheral) {
                if self.transport.is_connected(peripheral).await {
                    info!("Device already connected.");
                    return Ok(());
                }
                warn!("Link to {} was lost, reconnecting", peripheral.id);
                if let Err(e) = self.disconnect().await {
                    warn!("Teardown of stale session failed: {}", e);
                }
            } else {
                match self.reconnect_policy {
                    ReconnectPolicy::Reject => {
                        warn!(
                            "Refusing to connect to {} while connected to {}",
                            peripheral.id, current.id
                        );
                        return Err(BleError::AlreadyConnected(current.id));
                    }
                    ReconnectPolicy::ReplaceSession => {
                        info!("Replacing session with {} by {}", current.id, peripheral.id);
                        if let Err(e) = self.disconnect().await {
                            warn!("Teardown of replaced session failed: {}", e);
                        }
                    }
                }
            }
        }

        info!(
            "Device details - ID: {}, Name: {:?}",
            peripheral.id, peripheral.name
        );
        self.emitter.emit(BleEvent::Connecting(peripheral.clone()));

        let mut attempt = PendingConnect::begin(
            &mut self.state,
            &mut self.session,
            &self.transport,
            peripheral,
        );
        let result = establish(
            self.transport.as_ref(),
            peripheral,
            self.service_uuid,
            self.characteristic_uuid,
        )
        .await;

        match result {
            Ok(()) => {
                attempt.complete();
                info!("Connected to device: {}", peripheral.display_name());
                self.emitter.emit(BleEvent::Connected(peripheral.clone()));
                Ok(())
            }
            Err(e) => {
                // establish() has already dropped any half-open link
                attempt.fail();
                error!("Failed to connect to {}: {}", peripheral.id, e);
                self.emitter.emit(BleEvent::ConnectFailed {
                    peripheral: peripheral.clone(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Tears down the session, if any. Without a session this is a no-op.
    pub async fn disconnect(&mut self) -> Result<(), BleError> {
        let Some(session) = self.session.take() else {
            info!("No device connected, nothing to disconnect");
            return Ok(());
        };
        self.state = ConnectionState::Idle;
        info!("Connected state cleared for {}", session.peripheral.id);

        let result = self.transport.disconnect(&session.peripheral).await;
        match &result {
            Ok(()) => info!("Disconnected from device"),
            Err(e) => error!("Failed to disconnect from {}: {}", session.peripheral.id, e),
        }
        self.emitter.emit(BleEvent::Disconnected(session.peripheral));
        result
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The peripheral of the open session, once discovery has completed
    pub fn connected_device(&self) -> Option<&Peripheral> {
        self.session
            .as_ref()
            .filter(|session| session.is_ready())
            .map(|session| &session.peripheral)
    }

    /// Whether the session exists and the transport still reports the link as up
    pub async fn is_connected(&self) -> bool {
        match self.connected_device() {
            Some(peripheral) => self.transport.is_connected(peripheral).await,
            None => false,
        }
    }
}

async fn establish<T: BleTransport>(
    transport: &T,
    peripheral: &Peripheral,
    service_uuid: Uuid,
    characteristic_uuid: Uuid,
) -> Result<(), BleError> {
    transport.connect(peripheral).await?;

    if let Err(e) = transport
        .discover_services(peripheral, service_uuid, characteristic_uuid)
        .await
    {
        // Don't leave the link open without a session to own it.
        if let Err(teardown) = transport.disconnect(peripheral).await {
            warn!("Failed to drop link after discovery error: {}", teardown);
        }
        return Err(e);
    }
    Ok(())
}

/// Holds the manager in `Connecting` for the duration of one attempt.
/// If the attempt is dropped before it resolves, the state is reset and
/// the half-open link is torn down in the background.
struct PendingConnect<'a, T: BleTransport> {
    state: &'a mut ConnectionState,
    session: &'a mut Option<Session>,
    transport: &'a Arc<T>,
    peripheral: Peripheral,
    resolved: bool,
}

impl<'a, T: BleTransport> PendingConnect<'a, T> {
    fn begin(
        state: &'a mut ConnectionState,
        session: &'a mut Option<Session>,
        transport: &'a Arc<T>,
        peripheral: &Peripheral,
    ) -> Self {
        *state = ConnectionState::Connecting;
        *session = Some(Session::pending(peripheral.clone()));
        Self {
            state,
            session,
            transport,
            peripheral: peripheral.clone(),
            resolved: false,
        }
    }

    fn complete(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.services_discovered = true;
        }
        *self.state = ConnectionState::Connected;
        self.resolved = true;
    }

    fn fail(&mut self) {
        *self.session = None;
        *self.state = ConnectionState::Idle;
        self.resolved = true;
    }
}

impl<T: BleTransport> Drop for PendingConnect<'_, T> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        warn!("Connection attempt to {} was abandoned", self.peripheral.id);
        *self.session = None;
        *self.state = ConnectionState::Idle;

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("No runtime to tear down the link to {}", self.peripheral.id);
            return;
        };
        let transport = Arc::clone(self.transport);
        let peripheral = self.peripheral.clone();
        runtime.spawn(async move {
            if let Err(e) = transport.disconnect(&peripheral).await {
                warn!("Failed to drop abandoned link to {}: {}", peripheral.id, e);
            }
        });
    }
}

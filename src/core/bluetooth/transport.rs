//! Platform BLE stack interface
//! Everything that touches the radio goes through `BleTransport`, so the
//! session components can run against `bluest` or an in-memory stack.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::types::{Peripheral, ScanEvent};

#[async_trait::async_trait]
pub trait BleTransport: Send + Sync + 'static {
    /// Runs peripheral discovery, pushing every report into `events`
    /// until `cancel` fires or the platform stream ends.
    async fn discover(
        &self,
        events: mpsc::Sender<ScanEvent>,
        cancel: CancellationToken,
    ) -> Result<(), BleError>;

    /// Opens a transport-level link to the peripheral.
    async fn connect(&self, peripheral: &Peripheral) -> Result<(), BleError>;

    /// Resolves the given service and characteristic on a connected peripheral.
    async fn discover_services(
        &self,
        peripheral: &Peripheral,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<(), BleError>;

    /// Tears down the link to the peripheral.
    async fn disconnect(&self, peripheral: &Peripheral) -> Result<(), BleError>;

    /// Writes `data` to the characteristic and waits for the acknowledgement.
    async fn write_with_response(
        &self,
        peripheral: &Peripheral,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        data: &[u8],
    ) -> Result<(), BleError>;

    async fn is_connected(&self, peripheral: &Peripheral) -> bool;
}

use crate::{
    error::UazError,
    instance::{InstanceStatus, QrCode, UazInstance},
    message::{HistoryFilter, HistoryMessage, OutboundMessage, SendReceipt},
};
use async_trait::async_trait;

/// The UAZ REST backend, as seen by the console.
///
/// The HTTP client implements this; services take `Arc<dyn Backend>` so
/// they can run against in-memory fakes in tests.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All instances known to the backend.
    async fn list_instances(&self) -> Result<Vec<UazInstance>, UazError>;

    /// Live connection status of one instance.
    async fn instance_status(&self, instance_id: i64) -> Result<InstanceStatus, UazError>;

    /// Current pairing QR code. `Err(PairingInProgress)` while the gateway
    /// is still preparing one.
    async fn qr_code(&self, instance_id: i64) -> Result<QrCode, UazError>;

    /// Send one block to `number` through an instance.
    async fn send(
        &self,
        instance_id: i64,
        number: &str,
        message: &OutboundMessage,
        typing_delay_ms: u64,
    ) -> Result<SendReceipt, UazError>;

    /// Past send attempts within the filter's range.
    async fn history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryMessage>, UazError>;

    /// Re-import gateway instances by token. Returns how many were imported.
    async fn import_instances(&self, tokens: &[String]) -> Result<u32, UazError>;

    /// Delete an instance record.
    async fn delete_instance(&self, instance_id: i64) -> Result<(), UazError>;
}

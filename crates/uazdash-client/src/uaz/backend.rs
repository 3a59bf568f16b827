//! `Backend` trait implementation over HTTP.

use super::types::{send_body, CallContext, HistoryData, ImportRequest, ImportResult};
use super::UazClient;
use async_trait::async_trait;
use tracing::info;
use uazdash_core::{
    error::UazError,
    instance::{InstanceStatus, QrCode, UazInstance},
    message::{HistoryFilter, HistoryMessage, OutboundMessage, SendReceipt},
    traits::Backend,
};

fn missing(what: &str) -> UazError {
    UazError::Backend(format!("{what}: response has no data"))
}

#[async_trait]
impl Backend for UazClient {
    async fn list_instances(&self) -> Result<Vec<UazInstance>, UazError> {
        let req = self.client.get(self.url("/uaz/instances"));
        let data: Option<Vec<UazInstance>> = self
            .call(
                req,
                CallContext {
                    what: "list instances",
                    instance_id: None,
                },
            )
            .await?;
        Ok(data.unwrap_or_default())
    }

    async fn instance_status(&self, instance_id: i64) -> Result<InstanceStatus, UazError> {
        let what = format!("instance {instance_id} status");
        let req = self
            .client
            .get(self.url(&format!("/uaz/instances/{instance_id}/status")));
        self.call(
            req,
            CallContext {
                what: &what,
                instance_id: Some(instance_id),
            },
        )
        .await?
        .ok_or_else(|| missing(&what))
    }

    async fn qr_code(&self, instance_id: i64) -> Result<QrCode, UazError> {
        let what = format!("instance {instance_id} qrcode");
        let req = self
            .client
            .get(self.url(&format!("/uaz/instances/{instance_id}/qrcode")));
        self.call(
            req,
            CallContext {
                what: &what,
                instance_id: Some(instance_id),
            },
        )
        .await?
        .ok_or_else(|| missing(&what))
    }

    async fn send(
        &self,
        instance_id: i64,
        number: &str,
        message: &OutboundMessage,
        typing_delay_ms: u64,
    ) -> Result<SendReceipt, UazError> {
        let endpoint = message.endpoint();
        let what = format!("instance {instance_id} send-{endpoint}");
        let req = self
            .client
            .post(self.url(&format!("/uaz/instances/{instance_id}/send-{endpoint}")))
            .json(&send_body(number, message, typing_delay_ms));
        let receipt: Option<SendReceipt> = self
            .call(
                req,
                CallContext {
                    what: &what,
                    instance_id: Some(instance_id),
                },
            )
            .await?;
        Ok(receipt.unwrap_or_default())
    }

    async fn history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryMessage>, UazError> {
        let today = chrono::Local::now().date_naive();
        let req = self
            .client
            .get(self.url("/uaz/messages/history"))
            .query(&filter.query(today));
        let data: Option<HistoryData> = self
            .call(
                req,
                CallContext {
                    what: "message history",
                    instance_id: None,
                },
            )
            .await?;
        Ok(data.map(HistoryData::into_messages).unwrap_or_default())
    }

    async fn import_instances(&self, tokens: &[String]) -> Result<u32, UazError> {
        let req = self
            .client
            .post(self.url("/uaz/import-instances"))
            .json(&ImportRequest { tokens });
        let result: Option<ImportResult> = self
            .call(
                req,
                CallContext {
                    what: "import instances",
                    instance_id: None,
                },
            )
            .await?;
        let imported = result.map(|r| r.imported).unwrap_or_default();
        info!("uaz: imported {imported} instance(s)");
        Ok(imported)
    }

    async fn delete_instance(&self, instance_id: i64) -> Result<(), UazError> {
        let what = format!("delete instance {instance_id}");
        let req = self
            .client
            .delete(self.url(&format!("/uaz/instances/{instance_id}")));
        let _: Option<serde_json::Value> = self
            .call(
                req,
                CallContext {
                    what: &what,
                    instance_id: Some(instance_id),
                },
            )
            .await?;
        info!("uaz: deleted instance {instance_id}");
        Ok(())
    }
}

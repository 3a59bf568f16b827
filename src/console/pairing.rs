//! QR pairing flow for one instance.

use super::reconcile::{ReconcileOutcome, Reconciler};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uazdash_core::{
    error::UazError,
    instance::QrCode,
    notify::Notifier,
    traits::Backend,
};

/// Pause before returning when the instance vanished mid-pairing.
pub const DELETED_RETURN_DELAY: Duration = Duration::from_secs(3);

/// How a pairing session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingResult {
    /// The instance was already connected; nothing to pair.
    AlreadyConnected,
    /// The device was paired and duplicates were reconciled.
    Connected(ReconcileOutcome),
    /// The instance was deleted while pairing.
    Deleted,
}

impl PairingResult {
    /// Whether the operator should leave the pairing view for the instance list.
    pub fn should_redirect(&self) -> bool {
        match self {
            Self::Connected(outcome) => outcome.should_redirect(),
            Self::Deleted => true,
            Self::AlreadyConnected => false,
        }
    }
}

pub struct PairingFlow {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    reconciler: Arc<Reconciler>,
    interval: Duration,
    deleted_delay: Duration,
}

impl PairingFlow {
    pub fn new(
        backend: Arc<dyn Backend>,
        notifier: Notifier,
        reconciler: Arc<Reconciler>,
        interval: Duration,
    ) -> Self {
        Self {
            backend,
            notifier,
            reconciler,
            interval,
            deleted_delay: DELETED_RETURN_DELAY,
        }
    }

    #[cfg(test)]
    fn with_deleted_delay(mut self, delay: Duration) -> Self {
        self.deleted_delay = delay;
        self
    }

    /// Fetch the current QR code, retrying while the gateway answers
    /// "pairing in progress".
    pub async fn fetch_qr(&self, instance_id: i64) -> Result<QrCode, UazError> {
        loop {
            match self.backend.qr_code(instance_id).await {
                Err(UazError::PairingInProgress) => {
                    debug!("pairing: instance {instance_id} qrcode not ready yet");
                    tokio::time::sleep(self.interval).await;
                }
                other => return other,
            }
        }
    }

    /// Run the pairing loop until the device is connected or the instance
    /// disappears. `on_qr` is called each time a new QR payload arrives.
    pub async fn run<F>(&self, instance_id: i64, mut on_qr: F) -> Result<PairingResult, UazError>
    where
        F: FnMut(&QrCode),
    {
        match self.backend.instance_status(instance_id).await {
            Ok(status) if status.is_ready() => return Ok(PairingResult::AlreadyConnected),
            Ok(_) => {}
            Err(UazError::NotFound(_)) => return Ok(self.deleted(instance_id).await),
            Err(e) => return Err(e),
        }

        let mut last_payload: Option<String> = None;
        loop {
            let qr = match self.fetch_qr(instance_id).await {
                Ok(qr) => qr,
                Err(UazError::NotFound(_)) => return Ok(self.deleted(instance_id).await),
                Err(e) => return Err(e),
            };
            if qr.connected {
                break;
            }
            if qr.qrcode.is_some() && qr.qrcode != last_payload {
                last_payload = qr.qrcode.clone();
                on_qr(&qr);
            }

            tokio::time::sleep(self.interval).await;

            match self.backend.instance_status(instance_id).await {
                Ok(status) if status.is_ready() => break,
                Ok(_) => {}
                Err(UazError::NotFound(_)) => return Ok(self.deleted(instance_id).await),
                Err(e) => return Err(e),
            }
        }

        info!("pairing: instance {instance_id} connected");
        self.notifier.success(
            "Instância conectada",
            format!("A instância {instance_id} foi pareada"),
        );
        Ok(PairingResult::Connected(
            self.reconciler.reconcile_id(instance_id).await,
        ))
    }

    async fn deleted(&self, instance_id: i64) -> PairingResult {
        self.notifier.warning(
            "Instância excluída",
            format!("A instância {instance_id} foi excluída"),
        );
        tokio::time::sleep(self.deleted_delay).await;
        PairingResult::Deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::fake::{instance, status, FakeBackend, CONFLICT, NOT_FOUND};
    use uazdash_core::instance::ConnectionStatus::{Connected, Connecting, Disconnected};
    use uazdash_store::{audit::AuditLogger, Store};

    async fn flow(backend: Arc<FakeBackend>) -> PairingFlow {
        let store = Store::in_memory().await.unwrap();
        let notifier = Notifier::new();
        let reconciler = Arc::new(Reconciler::new(
            backend.clone(),
            notifier.clone(),
            AuditLogger::new(store.pool().clone()),
        ));
        PairingFlow::new(backend, notifier, reconciler, Duration::from_millis(5))
            .with_deleted_delay(Duration::from_millis(1))
    }

    fn qr(payload: &str) -> QrCode {
        QrCode {
            qrcode: Some(payload.into()),
            paircode: None,
            connected: false,
        }
    }

    #[tokio::test]
    async fn test_conflict_is_retried_silently() {
        let backend = Arc::new(FakeBackend::default());
        backend.script_qr(1, vec![Err(CONFLICT.into()), Err(CONFLICT.into()), Ok(qr("2@a"))]);
        let f = flow(backend).await;
        assert_eq!(f.fetch_qr(1).await.unwrap().qrcode.as_deref(), Some("2@a"));
    }

    #[tokio::test]
    async fn test_pairs_and_reconciles() {
        let backend = Arc::new(FakeBackend::with_instances(vec![
            instance(1, Some("5562999999999"), Connected),
            instance(2, Some("5562999999999"), Connected),
        ]));
        backend.script_status(
            1,
            vec![
                Ok(status(Disconnected)),
                Ok(status(Connecting)),
                Ok(status(Connecting)),
                Ok(status(Connected)),
            ],
        );
        backend.script_qr(1, vec![Ok(qr("2@a")), Ok(qr("2@a")), Ok(qr("2@b"))]);
        let f = flow(backend.clone()).await;

        let mut shown = Vec::new();
        let result = f
            .run(1, |q| shown.push(q.qrcode.clone().unwrap_or_default()))
            .await
            .unwrap();

        assert_eq!(shown, vec!["2@a".to_string(), "2@b".to_string()]);
        assert_eq!(
            result,
            PairingResult::Connected(ReconcileOutcome::KeptExisting {
                removed: 1,
                kept: 2
            })
        );
        assert!(result.should_redirect());
        assert_eq!(backend.instance_ids(), vec![2]);
        assert_eq!(backend.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_already_connected() {
        let backend = Arc::new(FakeBackend::with_instances(vec![instance(
            1,
            None,
            Connected,
        )]));
        let f = flow(backend).await;
        let result = f.run(1, |_| {}).await.unwrap();
        assert_eq!(result, PairingResult::AlreadyConnected);
        assert!(!result.should_redirect());
    }

    #[tokio::test]
    async fn test_deleted_while_pairing() {
        let backend = Arc::new(FakeBackend::default());
        backend.script_status(1, vec![Ok(status(Disconnected))]);
        backend.script_qr(1, vec![Ok(qr("2@a")), Err(NOT_FOUND.into())]);
        let f = flow(backend).await;
        let result = f.run(1, |_| {}).await.unwrap();
        assert_eq!(result, PairingResult::Deleted);
        assert!(result.should_redirect());
    }
}

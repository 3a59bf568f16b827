//! Duplicate-instance reconciliation.
//!
//! Runs once when an instance becomes connected. If another record on the
//! backend already owns the same phone number, one of the two is removed:
//! a live counterpart wins over the freshly paired record, otherwise the
//! fresh record wins. Failures are reported and leave things as they are;
//! a delete or import that already went through is not undone.

use std::sync::Arc;
use tracing::{info, warn};
use uazdash_core::{
    error::UazError, instance::UazInstance, notify::Notifier, traits::Backend,
};
use uazdash_store::audit::{AuditEntry, AuditLogger, AuditStatus};

/// What the reconciler decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No other record shares the phone number (or it is the same session).
    NoDuplicate,
    /// The other record was connected: the current one was deleted and the
    /// other re-imported. The pairing screen should be left.
    KeptExisting { removed: i64, kept: i64 },
    /// The other record was not connected and was deleted.
    KeptCurrent { removed: i64 },
    /// A backend call failed; nothing further was attempted.
    Failed { reason: String },
}

impl ReconcileOutcome {
    /// Whether the operator should be sent away from the pairing view.
    pub fn should_redirect(&self) -> bool {
        matches!(self, Self::KeptExisting { .. })
    }
}

pub struct Reconciler {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    audit: AuditLogger,
}

impl Reconciler {
    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier, audit: AuditLogger) -> Self {
        Self {
            backend,
            notifier,
            audit,
        }
    }

    /// List the instances once, then reconcile `instance_id` against the
    /// other records sharing its phone.
    pub async fn reconcile_id(&self, instance_id: i64) -> ReconcileOutcome {
        let instances = match self.backend.list_instances().await {
            Ok(list) => list,
            Err(e) => return self.failed(instance_id, e).await,
        };
        match instances.iter().find(|i| i.id == instance_id) {
            Some(current) => self.reconcile(current, &instances).await,
            None => {
                let missing = UazError::NotFound(format!("instance {instance_id}"));
                self.failed(instance_id, missing).await
            }
        }
    }

    /// Reconcile `current` against a listing that was just fetched.
    async fn reconcile(
        &self,
        current: &UazInstance,
        instances: &[UazInstance],
    ) -> ReconcileOutcome {
        match self.try_reconcile(current, instances).await {
            Ok(outcome) => {
                self.record(current.id, &outcome).await;
                outcome
            }
            Err(e) => self.failed(current.id, e).await,
        }
    }

    async fn failed(&self, instance_id: i64, e: UazError) -> ReconcileOutcome {
        warn!("reconcile: instance {instance_id} left as-is: {e}");
        self.notifier.warning(
            "Verificação de duplicidade falhou",
            format!("Instância {instance_id}: {e}"),
        );
        let outcome = ReconcileOutcome::Failed {
            reason: e.to_string(),
        };
        self.record(instance_id, &outcome).await;
        outcome
    }

    async fn try_reconcile(
        &self,
        current: &UazInstance,
        instances: &[UazInstance],
    ) -> Result<ReconcileOutcome, UazError> {
        let mut others: Vec<&UazInstance> = instances
            .iter()
            .filter(|i| i.id != current.id && i.shares_phone_with(current))
            .collect();
        // A live counterpart is authoritative over a stale one.
        others.sort_by_key(|i| !i.status.is_connected());

        let Some(other) = others.first() else {
            return Ok(ReconcileOutcome::NoDuplicate);
        };
        if !other.token.is_empty() && other.token == current.token {
            return Ok(ReconcileOutcome::NoDuplicate);
        }

        if other.status.is_connected() {
            info!(
                "reconcile: instance {} duplicates connected instance {}, keeping {}",
                current.id, other.id, other.id
            );
            self.backend
                .import_instances(std::slice::from_ref(&other.token))
                .await?;
            self.backend.delete_instance(current.id).await?;
            self.notifier.info(
                "Instância já conectada",
                format!(
                    "O número já estava conectado na instância {}. A nova instância {} foi removida.",
                    other.name, current.id
                ),
            );
            Ok(ReconcileOutcome::KeptExisting {
                removed: current.id,
                kept: other.id,
            })
        } else {
            info!(
                "reconcile: instance {} replaces stale instance {}",
                current.id, other.id
            );
            self.backend.delete_instance(other.id).await?;
            self.notifier.info(
                "Instância duplicada removida",
                format!(
                    "A instância antiga {} ({}) foi substituída pela instância {}.",
                    other.name, other.id, current.id
                ),
            );
            Ok(ReconcileOutcome::KeptCurrent { removed: other.id })
        }
    }

    async fn record(&self, instance_id: i64, outcome: &ReconcileOutcome) {
        let (detail, status) = match outcome {
            ReconcileOutcome::NoDuplicate => ("no duplicate".to_string(), AuditStatus::Ok),
            ReconcileOutcome::KeptExisting { removed, kept } => (
                format!("kept existing {kept}, removed {removed}"),
                AuditStatus::Ok,
            ),
            ReconcileOutcome::KeptCurrent { removed } => {
                (format!("kept current, removed {removed}"), AuditStatus::Ok)
            }
            ReconcileOutcome::Failed { reason } => (reason.clone(), AuditStatus::Error),
        };
        if let Err(e) = self
            .audit
            .log(&AuditEntry {
                instance_id: Some(instance_id),
                action: "reconcile".to_string(),
                detail,
                status,
            })
            .await
        {
            warn!("audit log write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::fake::{instance, FakeBackend};
    use uazdash_core::instance::ConnectionStatus::{Connected, Disconnected};
    use uazdash_store::Store;

    const PHONE: &str = "5562999999999";

    async fn reconciler(backend: Arc<FakeBackend>) -> (Reconciler, AuditLogger) {
        let store = Store::in_memory().await.unwrap();
        let audit = AuditLogger::new(store.pool().clone());
        (
            Reconciler::new(backend, Notifier::new(), audit.clone()),
            audit,
        )
    }

    #[tokio::test]
    async fn test_connected_counterpart_wins() {
        let a = instance(1, Some(PHONE), Connected);
        let b = instance(2, Some(&format!("{PHONE}@s.whatsapp.net")), Connected);
        let backend = Arc::new(FakeBackend::with_instances(vec![b.clone(), a.clone()]));
        let (r, audit) = reconciler(backend.clone()).await;

        let outcome = r.reconcile_id(a.id).await;
        assert_eq!(
            outcome,
            ReconcileOutcome::KeptExisting {
                removed: 1,
                kept: 2
            }
        );
        assert!(outcome.should_redirect());
        assert_eq!(backend.instance_ids(), vec![2]);
        assert_eq!(backend.imported(), vec!["tok-2".to_string()]);

        let rows = audit.recent(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "reconcile");
        assert_eq!(rows[0].status, "ok");
    }

    #[tokio::test]
    async fn test_disconnected_counterpart_is_removed() {
        let a = instance(1, Some(PHONE), Connected);
        let b = instance(2, Some(PHONE), Disconnected);
        let backend = Arc::new(FakeBackend::with_instances(vec![b, a.clone()]));
        let (r, _) = reconciler(backend.clone()).await;

        let outcome = r.reconcile_id(a.id).await;
        assert_eq!(outcome, ReconcileOutcome::KeptCurrent { removed: 2 });
        assert!(!outcome.should_redirect());
        assert_eq!(backend.instance_ids(), vec![1]);
        assert!(backend.imported().is_empty());
    }

    #[tokio::test]
    async fn test_no_counterpart_or_same_token() {
        let a = instance(1, Some(PHONE), Connected);
        let c = instance(3, Some("5511888887777"), Connected);
        let backend = Arc::new(FakeBackend::with_instances(vec![a.clone(), c]));
        let (r, _) = reconciler(backend.clone()).await;
        assert_eq!(r.reconcile_id(a.id).await, ReconcileOutcome::NoDuplicate);

        let mut same = instance(2, Some(PHONE), Connected);
        same.token = a.token.clone();
        let backend = Arc::new(FakeBackend::with_instances(vec![a.clone(), same]));
        let (r, _) = reconciler(backend.clone()).await;
        assert_eq!(r.reconcile_id(a.id).await, ReconcileOutcome::NoDuplicate);
        assert_eq!(backend.instance_ids(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_prefers_connected_among_several() {
        let a = instance(1, Some(PHONE), Connected);
        let stale = instance(2, Some(PHONE), Disconnected);
        let live = instance(3, Some(PHONE), Connected);
        let backend = Arc::new(FakeBackend::with_instances(vec![
            a.clone(),
            stale,
            live,
        ]));
        let (r, _) = reconciler(backend.clone()).await;
        assert_eq!(
            r.reconcile_id(a.id).await,
            ReconcileOutcome::KeptExisting {
                removed: 1,
                kept: 3
            }
        );
    }

    #[tokio::test]
    async fn test_backend_error_fails_open() {
        let a = instance(1, Some(PHONE), Connected);
        let b = instance(2, Some(PHONE), Connected);
        let backend = Arc::new(FakeBackend::with_instances(vec![a.clone(), b]));
        backend.fail_delete();
        let store = Store::in_memory().await.unwrap();
        let audit = AuditLogger::new(store.pool().clone());
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let r = Reconciler::new(backend.clone(), notifier, audit.clone());

        let outcome = r.reconcile_id(a.id).await;
        assert!(matches!(outcome, ReconcileOutcome::Failed { .. }));
        assert!(!outcome.should_redirect());
        // The import went through before the delete failed; it stays.
        assert_eq!(backend.imported(), vec!["tok-2".to_string()]);
        assert_eq!(backend.instance_ids(), vec![1, 2]);

        let n = rx.recv().await.unwrap();
        assert_eq!(n.level, uazdash_core::notify::NotificationLevel::Warning);
        assert_eq!(audit.recent(1).await.unwrap()[0].status, "error");
    }

    #[tokio::test]
    async fn test_unlisted_instance_fails_open() {
        let backend = Arc::new(FakeBackend::with_instances(vec![instance(
            2,
            Some(PHONE),
            Disconnected,
        )]));
        let (r, audit) = reconciler(backend.clone()).await;
        assert!(matches!(
            r.reconcile_id(1).await,
            ReconcileOutcome::Failed { .. }
        ));
        assert!(backend.deleted().is_empty());
        assert_eq!(backend.list_calls(), 1);
        let rows = audit.recent(1).await.unwrap();
        assert_eq!(rows[0].status, "error");
        assert_eq!(rows[0].instance_id, Some(1));
    }

    #[tokio::test]
    async fn test_list_failure_fails_open() {
        let a = instance(1, Some(PHONE), Connected);
        let backend = Arc::new(FakeBackend::with_instances(vec![a.clone()]));
        backend.fail_list();
        let (r, _) = reconciler(backend.clone()).await;
        assert!(matches!(
            r.reconcile_id(a.id).await,
            ReconcileOutcome::Failed { .. }
        ));
        assert!(backend.deleted().is_empty());
    }
}

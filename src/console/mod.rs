//! Console services wired from configuration.
//!
//! `Console` owns the shared handles (backend, store, job registry,
//! notifier, audit log) and builds the per-command services from them.
//! Dispatchers write through their own registry handle; the console's
//! handle follows those writes over the sync bus.

mod dispatch;
mod pairing;
mod poller;
mod reconcile;

#[cfg(test)]
pub(crate) mod fake;

pub use dispatch::Dispatcher;
pub use pairing::{PairingFlow, PairingResult};
pub use poller::StatusPoller;
pub use reconcile::{ReconcileOutcome, Reconciler};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uazdash_client::UazClient;
use uazdash_core::{
    config::{Config, PollerConfig},
    notify::Notifier,
    traits::Backend,
};
use uazdash_store::{AuditLogger, JobRegistry, Store, SyncBus};

/// Shared services of one console process.
pub struct Console {
    pub backend: Arc<dyn Backend>,
    pub store: Store,
    pub registry: JobRegistry,
    pub notifier: Notifier,
    pub audit: AuditLogger,
    pub poller_config: PollerConfig,
    pub data_dir: String,
    bus: SyncBus,
    sync_task: JoinHandle<()>,
}

impl Console {
    /// Open the store and connect the HTTP backend described by `cfg`.
    pub async fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let backend: Arc<dyn Backend> = Arc::new(UazClient::from_config(&cfg.backend)?);
        let store = Store::new(&cfg.store).await?;
        Self::with_backend(
            backend,
            store,
            cfg.poller.clone(),
            uazdash_core::shellexpand(&cfg.dashboard.data_dir),
        )
        .await
    }

    pub async fn with_backend(
        backend: Arc<dyn Backend>,
        store: Store,
        poller_config: PollerConfig,
        data_dir: String,
    ) -> anyhow::Result<Self> {
        let bus = SyncBus::new();
        let registry = JobRegistry::open(store.clone(), bus.clone()).await?;
        let sync_task = registry.spawn_sync();
        let audit = AuditLogger::new(store.pool().clone());
        Ok(Self {
            backend,
            store,
            registry,
            notifier: Notifier::new(),
            audit,
            poller_config,
            data_dir,
            bus,
            sync_task,
        })
    }

    pub fn reconciler(&self) -> Arc<Reconciler> {
        Arc::new(Reconciler::new(
            self.backend.clone(),
            self.notifier.clone(),
            self.audit.clone(),
        ))
    }

    pub fn poller(&self) -> StatusPoller {
        StatusPoller::new(
            self.registry.clone(),
            self.backend.clone(),
            self.notifier.clone(),
            self.reconciler(),
            Duration::from_millis(self.poller_config.interval_ms),
        )
    }

    pub fn pairing(&self) -> PairingFlow {
        PairingFlow::new(
            self.backend.clone(),
            self.notifier.clone(),
            self.reconciler(),
            Duration::from_millis(self.poller_config.qr_interval_ms),
        )
    }

    /// Dispatcher using the delay config currently saved in the store,
    /// writing through a registry handle of its own.
    pub async fn dispatcher(&self) -> anyhow::Result<Dispatcher> {
        let delays = self.store.load_delay_config().await?;
        let registry = JobRegistry::open(self.store.clone(), self.bus.clone()).await?;
        Ok(Dispatcher::new(
            self.backend.clone(),
            registry,
            self.audit.clone(),
            delays,
            Duration::from_millis(self.poller_config.pause_check_ms),
        ))
    }

    /// Stop background tasks.
    pub fn shutdown(self) {
        self.sync_task.abort();
    }
}

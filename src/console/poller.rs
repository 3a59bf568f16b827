//! Status poller. Watches job status changes and instance connectivity.
//!
//! Every tick re-reads the job list from storage, so changes made by other
//! processes are picked up, and compares it with the previous snapshot.
//! A change that happens and reverts between two ticks is never seen.
//! Besides the fixed interval, a tick also runs whenever the registry's
//! change feed fires and once more when the poller is stopped.

use super::reconcile::{ReconcileOutcome, Reconciler};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uazdash_core::{
    error::UazError,
    job::{JobStatus, SendingJob},
    notify::{Notification, NotificationLevel, Notifier},
    traits::Backend,
};
use uazdash_store::JobRegistry;

/// Notifications for jobs whose status changed between two snapshots.
///
/// Only transitions into `completed`, `error` and `cancelled` are reported.
/// Jobs absent from `previous` are new and stay silent.
pub fn job_transitions(previous: &[SendingJob], current: &[SendingJob]) -> Vec<Notification> {
    let before: HashMap<&str, JobStatus> =
        previous.iter().map(|j| (j.id.as_str(), j.status)).collect();

    current
        .iter()
        .filter_map(|job| {
            let old = *before.get(job.id.as_str())?;
            if old == job.status {
                return None;
            }
            match job.status {
                JobStatus::Completed => Some(Notification::new(
                    NotificationLevel::Success,
                    "Envio concluído",
                    format!(
                        "{} bloco(s) enviados para {}",
                        job.total_blocks, job.target_number
                    ),
                )),
                JobStatus::Error => Some(Notification::new(
                    NotificationLevel::Warning,
                    "Erro no envio",
                    format!(
                        "Envio para {} falhou: {}",
                        job.target_number,
                        job.error.as_deref().unwrap_or("erro desconhecido")
                    ),
                )),
                JobStatus::Cancelled => Some(Notification::new(
                    NotificationLevel::Info,
                    "Envio cancelado",
                    format!("Envio para {} foi cancelado", job.target_number),
                )),
                JobStatus::Sending | JobStatus::Paused => None,
            }
        })
        .collect()
}

/// Per-instance watch state.
#[derive(Debug, Default)]
struct InstanceWatch {
    /// Last observed readiness; `None` until the first answer.
    connected: Option<bool>,
    /// Last reported error, to avoid repeating it every tick.
    last_error: Option<String>,
}

/// What a status check means for the watch on one instance.
#[derive(Debug, PartialEq, Eq)]
enum WatchStep {
    Continue,
    Done,
    /// The instance was replaced by this already-connected one.
    Follow(i64),
}

/// State carried from one tick to the next.
#[derive(Debug, Default)]
pub struct PollState {
    jobs: Option<Vec<SendingJob>>,
    instances: HashMap<i64, InstanceWatch>,
}

impl PollState {
    pub fn watching(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.instances.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Fixed-interval poller. Configure it, then `start()` it.
pub struct StatusPoller {
    registry: JobRegistry,
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    reconciler: Arc<Reconciler>,
    interval: Duration,
    watch: Vec<i64>,
    baseline: Option<Vec<SendingJob>>,
}

/// Running poller. Dropping the handle also ends the loop.
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<PollState>,
}

impl PollerHandle {
    /// Signal the loop to stop and wait for its final tick.
    pub async fn stop(self) -> PollState {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(state) => state,
            Err(e) => {
                warn!("poller task ended abnormally: {e}");
                PollState::default()
            }
        }
    }
}

impl StatusPoller {
    pub fn new(
        registry: JobRegistry,
        backend: Arc<dyn Backend>,
        notifier: Notifier,
        reconciler: Arc<Reconciler>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            backend,
            notifier,
            reconciler,
            interval,
            watch: Vec::new(),
            baseline: None,
        }
    }

    /// Also watch the connectivity of these instances.
    pub fn watch_instances(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.watch.extend(ids);
        self
    }

    /// Compare the first tick against `jobs` instead of the stored list.
    pub fn with_baseline(mut self, jobs: Vec<SendingJob>) -> Self {
        self.baseline = Some(jobs);
        self
    }

    /// Initial state: current jobs as baseline, configured instances pending.
    pub async fn initial_state(&self) -> PollState {
        let jobs = match &self.baseline {
            Some(jobs) => Some(jobs.clone()),
            None => match self.registry.reload().await {
                Ok(jobs) => Some(jobs),
                Err(e) => {
                    warn!("poller: initial job load failed: {e}");
                    None
                }
            },
        };
        PollState {
            jobs,
            instances: self
                .watch
                .iter()
                .map(|id| (*id, InstanceWatch::default()))
                .collect(),
        }
    }

    /// Spawn the polling loop.
    pub async fn start(self) -> PollerHandle {
        let mut state = self.initial_state().await;
        let (shutdown, mut stop_rx) = watch::channel(false);
        info!(
            "poller started: every {} ms, watching {} instance(s)",
            self.interval.as_millis(),
            state.instances.len()
        );

        let mut changes = self.registry.subscribe();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            let mut feed_open = true;
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.tick(&mut state).await,
                    changed = changes.recv(), if feed_open => match changed {
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                            self.tick(&mut state).await;
                            ticker.reset();
                        }
                        Err(broadcast::error::RecvError::Closed) => feed_open = false,
                    },
                    _ = stop_rx.changed() => {
                        self.tick(&mut state).await;
                        break;
                    }
                }
            }
            info!("poller stopped");
            state
        });

        PollerHandle { shutdown, task }
    }

    /// One polling round.
    pub async fn tick(&self, state: &mut PollState) {
        match self.registry.reload().await {
            Ok(jobs) => {
                if let Some(previous) = &state.jobs {
                    for n in job_transitions(previous, &jobs) {
                        self.notifier.notify(n);
                    }
                }
                state.jobs = Some(jobs);
            }
            Err(e) => warn!("poller: job reload failed: {e}"),
        }

        let mut steps = Vec::new();
        for (id, watch) in state.instances.iter_mut() {
            match self.check_instance(*id, watch).await {
                WatchStep::Continue => {}
                step => steps.push((*id, step)),
            }
        }
        for (id, step) in steps {
            state.instances.remove(&id);
            if let WatchStep::Follow(kept) = step {
                state.instances.entry(kept).or_insert(InstanceWatch {
                    connected: Some(true),
                    last_error: None,
                });
            }
        }
    }

    async fn check_instance(&self, id: i64, watch: &mut InstanceWatch) -> WatchStep {
        match self.backend.instance_status(id).await {
            Ok(status) => {
                watch.last_error = None;
                let now = status.is_ready();
                let was = watch.connected.replace(now);
                debug!("poller: instance {id} is {}", status.status);
                if now && was == Some(false) {
                    return self.on_connected(id).await;
                }
                WatchStep::Continue
            }
            Err(UazError::NotFound(_)) => {
                self.notifier.warning(
                    "Instância excluída",
                    format!("A instância {id} foi excluída"),
                );
                WatchStep::Done
            }
            Err(e) => {
                let msg = e.to_string();
                if watch.last_error.as_deref() != Some(msg.as_str()) {
                    if e.is_connectivity() {
                        self.notifier.warning("Instância desconectada", msg.clone());
                    } else {
                        warn!("poller: instance {id} status check failed: {msg}");
                    }
                    watch.last_error = Some(msg);
                }
                WatchStep::Continue
            }
        }
    }

    async fn on_connected(&self, id: i64) -> WatchStep {
        self.notifier
            .success("Instância conectada", format!("A instância {id} está conectada"));

        match self.reconciler.reconcile_id(id).await {
            ReconcileOutcome::KeptExisting { removed, kept } => {
                info!("poller: instance {removed} replaced by existing instance {kept}");
                self.notifier.info(
                    "Redirecionado",
                    format!("Acompanhando a instância {kept} no lugar da instância {removed}"),
                );
                WatchStep::Follow(kept)
            }
            _ => WatchStep::Done,
        }
    }
}

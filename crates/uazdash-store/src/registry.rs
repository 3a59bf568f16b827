//! Sending-job registry.
//!
//! The whole job list is one JSON document under `sendingJobs`. Every
//! mutation re-reads the document, applies the change and writes the full
//! list back (last writer wins). Local observers get a `JobsChanged` on the
//! change feed; other handles get a `SyncMessage` on the bus and reload.

use crate::store::Store;
use crate::sync::SyncBus;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uazdash_core::{
    error::UazError,
    job::{JobStatus, NewJob, SendingJob},
};
use uuid::Uuid;

/// Storage key of the job list.
pub const JOBS_KEY: &str = "sendingJobs";

/// Change-feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobsChanged {
    /// The change was made through another handle.
    pub remote: bool,
}

struct Inner {
    store: Store,
    bus: SyncBus,
    origin: Uuid,
    jobs: Mutex<Vec<SendingJob>>,
    changes: broadcast::Sender<JobsChanged>,
}

/// Handle to the persisted job list. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<Inner>,
}

impl JobRegistry {
    /// Open a registry handle over `store`, loading the current list.
    pub async fn open(store: Store, bus: SyncBus) -> Result<Self, UazError> {
        let jobs = read_jobs(&store).await?;
        let (changes, _) = broadcast::channel(64);
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                bus,
                origin: Uuid::new_v4(),
                jobs: Mutex::new(jobs),
                changes,
            }),
        })
    }

    /// Subscribe to the change feed.
    pub fn subscribe(&self) -> broadcast::Receiver<JobsChanged> {
        self.inner.changes.subscribe()
    }

    /// Snapshot of the jobs as last seen by this handle, in insertion order.
    pub async fn jobs(&self) -> Vec<SendingJob> {
        self.inner.jobs.lock().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<SendingJob> {
        self.inner
            .jobs
            .lock()
            .await
            .iter()
            .find(|j| j.id == id)
            .cloned()
    }

    /// Re-read the list from storage.
    pub async fn reload(&self) -> Result<Vec<SendingJob>, UazError> {
        let mut guard = self.inner.jobs.lock().await;
        *guard = read_jobs(&self.inner.store).await?;
        Ok(guard.clone())
    }

    /// Append a new job with status `sending` and zero progress.
    pub async fn create_job(&self, params: NewJob) -> Result<SendingJob, UazError> {
        let job = SendingJob::new(params);
        let created = job.clone();
        self.mutate(move |jobs| {
            jobs.push(job);
            1
        })
        .await?;
        info!(
            "job {} created: {} block(s) to {} via instance {}",
            created.id, created.total_blocks, created.target_number, created.instance_id
        );
        Ok(created)
    }

    /// Transition a job. Returns `false` when the job is unknown or the
    /// transition is not allowed; nothing is written in that case.
    pub async fn set_status(&self, id: &str, status: JobStatus) -> Result<bool, UazError> {
        let id_owned = id.to_string();
        let applied = self
            .mutate(move |jobs| {
                let applied = jobs
                    .iter_mut()
                    .find(|j| j.id == id_owned)
                    .is_some_and(|j| j.transition(status));
                usize::from(applied)
            })
            .await?
            > 0;
        if applied {
            info!("job {id} -> {status}");
        } else {
            debug!("job {id}: transition to {status} rejected");
        }
        Ok(applied)
    }

    /// Record progress reported by the sender. Ignored unless the job is
    /// sending and `current_block` moves forward.
    pub async fn report_progress(&self, id: &str, current_block: u32) -> Result<bool, UazError> {
        let id = id.to_string();
        let changed = self
            .mutate(move |jobs| {
                let moved = jobs
                    .iter_mut()
                    .find(|j| j.id == id)
                    .is_some_and(|j| j.record_progress(current_block));
                usize::from(moved)
            })
            .await?;
        Ok(changed > 0)
    }

    /// Move a sending job to `error`, keeping the message.
    pub async fn fail(&self, id: &str, error: &str) -> Result<bool, UazError> {
        let id_owned = id.to_string();
        let error = error.to_string();
        let applied = self
            .mutate(move |jobs| match jobs.iter_mut().find(|j| j.id == id_owned) {
                Some(job) => {
                    if job.transition(JobStatus::Error) {
                        job.error = Some(error);
                        1
                    } else {
                        0
                    }
                }
                None => 0,
            })
            .await?
            > 0;
        if applied {
            warn!("job {id} failed");
        }
        Ok(applied)
    }

    /// Delete a job regardless of its status.
    pub async fn remove(&self, id: &str) -> Result<bool, UazError> {
        let id = id.to_string();
        let removed = self
            .mutate(move |jobs| {
                let before = jobs.len();
                jobs.retain(|j| j.id != id);
                before - jobs.len()
            })
            .await?;
        Ok(removed > 0)
    }

    /// Delete every completed, errored or cancelled job. Returns how many
    /// were removed.
    pub async fn clear_finished(&self) -> Result<usize, UazError> {
        let removed = self
            .mutate(|jobs| {
                let before = jobs.len();
                jobs.retain(|j| !j.status.is_finished());
                before - jobs.len()
            })
            .await?;
        if removed > 0 {
            info!("cleared {removed} finished job(s)");
        }
        Ok(removed)
    }

    /// Background task: reload whenever another handle announces a write
    /// to the job list. Runs until the returned handle is aborted.
    pub fn spawn_sync(&self) -> JoinHandle<()> {
        let registry = self.clone();
        let mut rx = self.inner.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(msg) => {
                        if msg.key != JOBS_KEY || msg.origin == registry.inner.origin {
                            continue;
                        }
                        registry.reload_remote().await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!("registry sync lagged by {n} messages, reloading");
                        registry.reload_remote().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn reload_remote(&self) {
        match self.reload().await {
            Ok(_) => {
                let _ = self.inner.changes.send(JobsChanged { remote: true });
            }
            Err(e) => warn!("registry sync reload failed: {e}"),
        }
    }

    /// Read-modify-write of the whole list. `f` returns how many jobs it
    /// touched; an untouched list is not written back.
    async fn mutate<F>(&self, f: F) -> Result<usize, UazError>
    where
        F: FnOnce(&mut Vec<SendingJob>) -> usize,
    {
        let mut guard = self.inner.jobs.lock().await;
        let mut jobs = read_jobs(&self.inner.store).await?;
        let changed = f(&mut jobs);
        if changed > 0 {
            self.inner.store.put_json(JOBS_KEY, &jobs).await?;
        }
        *guard = jobs;
        drop(guard);

        if changed > 0 {
            let _ = self.inner.changes.send(JobsChanged { remote: false });
            self.inner.bus.publish(JOBS_KEY, self.inner.origin);
        }
        Ok(changed)
    }
}

/// Decode the stored list. An unreadable document is treated as empty.
async fn read_jobs(store: &Store) -> Result<Vec<SendingJob>, UazError> {
    match store.get_json::<Vec<SendingJob>>(JOBS_KEY).await {
        Ok(jobs) => Ok(jobs.unwrap_or_default()),
        Err(UazError::Serialization(e)) => {
            warn!("stored {JOBS_KEY} is unreadable, starting empty: {e}");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn params(number: &str) -> NewJob {
        NewJob {
            total_blocks: 2,
            target_number: number.to_string(),
            instance_id: 7,
            message_type: Some("text".into()),
        }
    }

    async fn registry() -> JobRegistry {
        let store = Store::in_memory().await.unwrap();
        JobRegistry::open(store, SyncBus::new()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_job_persists() {
        let reg = registry().await;
        let job = reg.create_job(params("5562999999999")).await.unwrap();
        assert_eq!(job.status, JobStatus::Sending);
        assert_eq!(job.progress, 0);

        let stored: Vec<SendingJob> = reg
            .inner
            .store
            .get_json(JOBS_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, vec![job]);
    }

    #[tokio::test]
    async fn test_insertion_order_kept() {
        let reg = registry().await;
        let a = reg.create_job(params("5562911111111")).await.unwrap();
        let b = reg.create_job(params("5562922222222")).await.unwrap();
        let c = reg.create_job(params("5562933333333")).await.unwrap();
        reg.set_status(&b.id, JobStatus::Paused).await.unwrap();
        let ids: Vec<String> = reg.jobs().await.into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn test_set_status_transitions() {
        let reg = registry().await;
        let job = reg.create_job(params("5562999999999")).await.unwrap();
        assert!(reg.set_status(&job.id, JobStatus::Paused).await.unwrap());
        assert!(!reg.set_status(&job.id, JobStatus::Completed).await.unwrap());
        assert_eq!(reg.get(&job.id).await.unwrap().status, JobStatus::Paused);
        assert!(reg.set_status(&job.id, JobStatus::Sending).await.unwrap());
        assert!(reg.set_status(&job.id, JobStatus::Completed).await.unwrap());
        assert!(!reg.set_status(&job.id, JobStatus::Sending).await.unwrap());
        assert_eq!(reg.get(&job.id).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_unknown_job_is_noop() {
        let reg = registry().await;
        assert!(!reg.set_status("missing", JobStatus::Paused).await.unwrap());
        assert!(!reg.remove("missing").await.unwrap());
        assert!(reg.inner.store.get_raw(JOBS_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_finished_keeps_only_sending() {
        let reg = registry().await;
        let sending = reg.create_job(params("5562900000001")).await.unwrap();
        let completed = reg.create_job(params("5562900000002")).await.unwrap();
        let errored = reg.create_job(params("5562900000003")).await.unwrap();
        let cancelled = reg.create_job(params("5562900000004")).await.unwrap();
        reg.set_status(&completed.id, JobStatus::Completed).await.unwrap();
        reg.fail(&errored.id, "gateway timeout").await.unwrap();
        reg.set_status(&cancelled.id, JobStatus::Cancelled).await.unwrap();

        assert_eq!(reg.clear_finished().await.unwrap(), 3);
        let left = reg.reload().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, sending.id);
    }

    #[tokio::test]
    async fn test_remove_is_unconditional() {
        let reg = registry().await;
        let job = reg.create_job(params("5562999999999")).await.unwrap();
        assert!(reg.remove(&job.id).await.unwrap());
        assert!(reg.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_fail_records_error() {
        let reg = registry().await;
        let job = reg.create_job(params("5562999999999")).await.unwrap();
        assert!(reg.fail(&job.id, "invalid token").await.unwrap());
        let stored = reg.get(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Error);
        assert_eq!(stored.error.as_deref(), Some("invalid token"));
        // error is terminal
        assert!(!reg.fail(&job.id, "again").await.unwrap());
        assert_eq!(
            reg.get(&job.id).await.unwrap().error.as_deref(),
            Some("invalid token")
        );
        assert!(!reg.fail("missing", "gateway timeout").await.unwrap());
    }

    #[tokio::test]
    async fn test_progress_monotonic_through_registry() {
        let reg = registry().await;
        let job = reg.create_job(params("5562999999999")).await.unwrap();
        assert!(reg.report_progress(&job.id, 1).await.unwrap());
        assert!(!reg.report_progress(&job.id, 1).await.unwrap());
        assert_eq!(reg.get(&job.id).await.unwrap().progress, 50);
    }

    #[tokio::test]
    async fn test_change_feed_emits_local_changes() {
        let reg = registry().await;
        let mut rx = reg.subscribe();
        reg.create_job(params("5562999999999")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), JobsChanged { remote: false });
    }

    #[tokio::test]
    async fn test_other_handle_reloads_on_sync_message() {
        let store = Store::in_memory().await.unwrap();
        let bus = SyncBus::new();
        let a = JobRegistry::open(store.clone(), bus.clone()).await.unwrap();
        let b = JobRegistry::open(store, bus).await.unwrap();
        let mut b_changes = b.subscribe();
        let sync = b.spawn_sync();

        let job = a.create_job(params("5562999999999")).await.unwrap();

        let ev = tokio::time::timeout(Duration::from_secs(2), b_changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(ev.remote);
        assert_eq!(b.jobs().await, vec![job]);
        sync.abort();
    }

    #[tokio::test]
    async fn test_last_writer_wins_across_handles() {
        let store = Store::in_memory().await.unwrap();
        let a = JobRegistry::open(store.clone(), SyncBus::new()).await.unwrap();
        let b = JobRegistry::open(store, SyncBus::new()).await.unwrap();
        let job = a.create_job(params("5562999999999")).await.unwrap();

        // b never reloaded, yet its mutation starts from the stored list.
        assert!(b.set_status(&job.id, JobStatus::Cancelled).await.unwrap());
        let seen_by_a = a.reload().await.unwrap();
        assert_eq!(seen_by_a[0].status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_corrupt_document_reads_as_empty() {
        let store = Store::in_memory().await.unwrap();
        store.put_raw(JOBS_KEY, "{not json").await.unwrap();
        let reg = JobRegistry::open(store, SyncBus::new()).await.unwrap();
        assert!(reg.jobs().await.is_empty());
    }
}

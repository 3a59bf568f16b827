//! Message dispatch: validates a send, registers the job and runs it.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uazdash_core::{
    delay::DelayConfig,
    error::UazError,
    job::{JobStatus, NewJob, SendingJob},
    message::OutboundMessage,
    traits::Backend,
    validate::{normalize_phone, validate_message},
};
use uazdash_store::{
    audit::{AuditEntry, AuditLogger, AuditStatus},
    JobRegistry,
};

/// A send started by the dispatcher.
pub struct Dispatch {
    pub job: SendingJob,
    /// Resolves to the job's final status.
    pub handle: JoinHandle<JobStatus>,
}

/// Validates sends, checks connectivity and runs jobs in the background.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn Backend>,
    registry: JobRegistry,
    audit: AuditLogger,
    delays: DelayConfig,
    pause_check: Duration,
}

/// Result of waiting at a block boundary.
enum Gate {
    Proceed,
    Stop(JobStatus),
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn Backend>,
        registry: JobRegistry,
        audit: AuditLogger,
        delays: DelayConfig,
        pause_check: Duration,
    ) -> Self {
        Self {
            backend,
            registry,
            audit,
            delays,
            pause_check,
        }
    }

    /// Validate every block, check the instance, create the job and spawn
    /// the sender. Nothing touches the network when validation fails.
    pub async fn dispatch(
        &self,
        instance_id: i64,
        number: &str,
        blocks: Vec<OutboundMessage>,
    ) -> Result<Dispatch, UazError> {
        let number = normalize_phone(number)?;
        if blocks.is_empty() {
            return Err(UazError::Validation("nothing to send".into()));
        }
        let total_blocks = block_count(blocks.len())?;
        for block in &blocks {
            validate_message(block)?;
        }
        self.delays.validate()?;

        self.ensure_connected(instance_id).await?;

        let job = self
            .registry
            .create_job(NewJob {
                total_blocks,
                target_number: number.clone(),
                instance_id,
                message_type: Some(message_type(&blocks)),
            })
            .await?;

        let runner = self.clone();
        let job_id = job.id.clone();
        let handle = tokio::spawn(async move {
            let status = runner.run(&job_id, instance_id, &number, &blocks).await;
            runner.record(&job_id, instance_id, status).await;
            status
        });

        Ok(Dispatch { job, handle })
    }

    /// Fails with remediation text when the instance cannot send right now.
    pub async fn ensure_connected(&self, instance_id: i64) -> Result<(), UazError> {
        let status = self.backend.instance_status(instance_id).await?;
        if status.is_ready() {
            return Ok(());
        }
        Err(UazError::Disconnected {
            instance_id,
            remediation: format!(
                "status is {}; pair it again with `uazdash pair {instance_id}`",
                status.status
            ),
        })
    }

    async fn run(
        &self,
        job_id: &str,
        instance_id: i64,
        number: &str,
        blocks: &[OutboundMessage],
    ) -> JobStatus {
        // Seeded per job: `ThreadRng` cannot be held across awaits.
        let mut rng = StdRng::from_entropy();
        match self.delays.before_sending(&mut rng) {
            Ok(wait) => tokio::time::sleep(wait).await,
            Err(e) => return self.abort(job_id, &e).await,
        }

        for (index, block) in blocks.iter().enumerate() {
            if index > 0 {
                match self.delays.between_messages(&mut rng) {
                    Ok(wait) => tokio::time::sleep(wait).await,
                    Err(e) => return self.abort(job_id, &e).await,
                }
            }
            if let Gate::Stop(status) = self.gate(job_id).await {
                info!("job {job_id}: stopped at block {index} ({status})");
                return status;
            }

            let typing = block
                .typed_text()
                .map(|t| self.delays.typing_delay_ms(t))
                .unwrap_or(0);
            match self.backend.send(instance_id, number, block, typing).await {
                Ok(receipt) => {
                    info!(
                        "job {job_id}: block {}/{} sent ({})",
                        index + 1,
                        blocks.len(),
                        receipt.message_id.as_deref().unwrap_or("no id")
                    );
                    if let Err(e) = self
                        .registry
                        .report_progress(job_id, index as u32 + 1)
                        .await
                    {
                        warn!("job {job_id}: progress not saved: {e}");
                    }
                }
                Err(e) => {
                    error!("job {job_id}: block {} failed: {e}", index + 1);
                    return self.abort(job_id, &e).await;
                }
            }
        }

        // A pause or cancel issued during the last send still applies.
        if let Gate::Stop(status) = self.gate(job_id).await {
            return status;
        }
        match self.registry.set_status(job_id, JobStatus::Completed).await {
            Ok(true) => JobStatus::Completed,
            Ok(false) => self
                .registry
                .get(job_id)
                .await
                .map(|j| j.status)
                .unwrap_or(JobStatus::Cancelled),
            Err(e) => {
                warn!("job {job_id}: completion not saved: {e}");
                JobStatus::Completed
            }
        }
    }

    /// Mark the job `error` with `cause`.
    async fn abort(&self, job_id: &str, cause: &UazError) -> JobStatus {
        if let Err(store_err) = self.registry.fail(job_id, &cause.to_string()).await {
            warn!("job {job_id}: failure not saved: {store_err}");
        }
        JobStatus::Error
    }

    /// Wait while the job is paused. Re-reads storage so pauses issued by
    /// other processes are honored.
    async fn gate(&self, job_id: &str) -> Gate {
        loop {
            if let Err(e) = self.registry.reload().await {
                warn!("job {job_id}: reload failed: {e}");
            }
            match self.registry.get(job_id).await.map(|j| j.status) {
                Some(JobStatus::Sending) => return Gate::Proceed,
                Some(JobStatus::Paused) => tokio::time::sleep(self.pause_check).await,
                Some(other) => return Gate::Stop(other),
                // Removed from the list: treat as cancelled.
                None => return Gate::Stop(JobStatus::Cancelled),
            }
        }
    }

    async fn record(&self, job_id: &str, instance_id: i64, status: JobStatus) {
        let entry = AuditEntry {
            instance_id: Some(instance_id),
            action: "dispatch".to_string(),
            detail: format!("job {job_id} {status}"),
            status: if status == JobStatus::Error {
                AuditStatus::Error
            } else {
                AuditStatus::Ok
            },
        };
        if let Err(e) = self.audit.log(&entry).await {
            warn!("audit log write failed: {e}");
        }
    }
}

fn block_count(len: usize) -> Result<u32, UazError> {
    u32::try_from(len)
        .map_err(|_| UazError::Validation(format!("too many blocks in one send: {len}")))
}

/// Label stored on the job: the block kind, or `combined`.
fn message_type(blocks: &[OutboundMessage]) -> String {
    match blocks {
        [single] => single.endpoint().to_string(),
        _ => "combined".to_string(),
    }
}

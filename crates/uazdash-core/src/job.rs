//! Sending jobs: client-tracked units of outbound work.
//!
//! A job is created with status `sending` and moves through a closed
//! transition table:
//!
//! | from      | to                               |
//! |-----------|----------------------------------|
//! | sending   | paused, cancelled, completed, error |
//! | paused    | sending, cancelled               |
//!
//! `completed`, `error` and `cancelled` are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a job carries one message block or several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Simple,
    Combined,
}

/// Lifecycle state of a sending job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Sending,
    Paused,
    Completed,
    Error,
    Cancelled,
}

impl JobStatus {
    /// Whether `self -> next` is in the transition table.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Sending, Paused)
                | (Paused, Sending)
                | (Sending, Cancelled)
                | (Paused, Cancelled)
                | (Sending, Completed)
                | (Sending, Error)
        )
    }

    /// Completed, errored and cancelled jobs are finished.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sending" => Ok(Self::Sending),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Parameters for a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub total_blocks: u32,
    pub target_number: String,
    pub instance_id: i64,
    pub message_type: Option<String>,
}

/// A persisted sending job. Field names match the `sendingJobs` JSON list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendingJob {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: u8,
    pub total_blocks: u32,
    pub current_block: u32,
    pub target_number: String,
    pub instance_id: i64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendingJob {
    /// Build a fresh job in `sending` state with zero progress.
    pub fn new(params: NewJob) -> Self {
        let total_blocks = params.total_blocks.max(1);
        Self {
            id: Uuid::new_v4().to_string(),
            kind: if total_blocks > 1 {
                JobKind::Combined
            } else {
                JobKind::Simple
            },
            status: JobStatus::Sending,
            progress: 0,
            total_blocks,
            current_block: 0,
            target_number: params.target_number,
            instance_id: params.instance_id,
            started_at: Utc::now(),
            message_type: params.message_type,
            error: None,
        }
    }

    /// Apply a status transition. Returns `false` (and leaves the job
    /// untouched) when the transition is not in the table.
    pub fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next == JobStatus::Completed {
            self.current_block = self.total_blocks;
            self.progress = 100;
        }
        true
    }

    /// Record that `current_block` blocks are done. Only moves forward and
    /// only while sending.
    pub fn record_progress(&mut self, current_block: u32) -> bool {
        if self.status != JobStatus::Sending || current_block <= self.current_block {
            return false;
        }
        self.current_block = current_block.min(self.total_blocks);
        self.progress = progress_percent(self.current_block, self.total_blocks);
        true
    }
}

/// `done / total` as a 0–100 percentage.
pub fn progress_percent(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    ((u64::from(done.min(total)) * 100) / u64::from(total)) as u8
}

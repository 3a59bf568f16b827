//! Audit log. Records every backend-mutating decision the console makes.

use sqlx::SqlitePool;
use tracing::debug;
use uazdash_core::error::UazError;
use uuid::Uuid;

/// An entry to write to the audit log.
pub struct AuditEntry {
    pub instance_id: Option<i64>,
    /// Short action name, e.g. `reconcile.delete` or `dispatch`.
    pub action: String,
    pub detail: String,
    pub status: AuditStatus,
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Ok,
    Error,
}

impl AuditStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// A row read back from the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub timestamp: String,
    pub instance_id: Option<i64>,
    pub action: String,
    pub detail: String,
    pub status: String,
}

/// Audit logger backed by SQLite.
#[derive(Clone)]
pub struct AuditLogger {
    pool: SqlitePool,
}

impl AuditLogger {
    /// Create a new audit logger sharing the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write an entry to the audit log.
    pub async fn log(&self, entry: &AuditEntry) -> Result<(), UazError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO audit_log (id, instance_id, action, detail, status) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(entry.instance_id)
        .bind(&entry.action)
        .bind(&entry.detail)
        .bind(entry.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| UazError::Store(format!("audit log write failed: {e}")))?;

        debug!(
            "audit: {} instance={:?} [{}] {}",
            entry.action,
            entry.instance_id,
            entry.status.as_str(),
            truncate(&entry.detail, 80)
        );

        Ok(())
    }

    /// Most recent entries, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditRecord>, UazError> {
        let rows: Vec<(String, Option<i64>, String, String, String)> = sqlx::query_as(
            "SELECT timestamp, instance_id, action, detail, status FROM audit_log \
             ORDER BY timestamp DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| UazError::Store(format!("audit log read failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(
                |(timestamp, instance_id, action, detail, status)| AuditRecord {
                    timestamp,
                    instance_id,
                    action,
                    detail,
                    status,
                },
            )
            .collect())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

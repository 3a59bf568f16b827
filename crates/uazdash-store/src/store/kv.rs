//! Whole-document key/value access. Writes always replace the full value.

use super::Store;
use serde::{de::DeserializeOwned, Serialize};
use uazdash_core::error::UazError;

impl Store {
    /// Raw JSON text stored under `key`.
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>, UazError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| UazError::Store(format!("read {key} failed: {e}")))?;
        Ok(row.map(|(v,)| v))
    }

    /// Overwrite `key` with `value`.
    pub async fn put_raw(&self, key: &str, value: &str) -> Result<(), UazError> {
        sqlx::query(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now')) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| UazError::Store(format!("write {key} failed: {e}")))?;
        Ok(())
    }

    /// Decode the document under `key`, if present.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, UazError> {
        match self.get_raw(key).await? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// Encode `value` and overwrite `key` with it.
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), UazError> {
        let text = serde_json::to_string(value)?;
        self.put_raw(key, &text).await
    }
}

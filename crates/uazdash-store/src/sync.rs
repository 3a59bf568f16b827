//! Cross-handle change announcements.
//!
//! Several `JobRegistry` handles can share one store (several console
//! windows, a dispatcher and a watcher). A handle that writes a key
//! publishes a `SyncMessage`; the others treat it purely as a cue to
//! re-read that key. The message never carries the data itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// "Key `key` was rewritten by handle `origin` at `at`."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub key: String,
    pub origin: Uuid,
    pub at: DateTime<Utc>,
}

/// In-process pub/sub channel for `SyncMessage`s.
#[derive(Clone)]
pub struct SyncBus {
    tx: broadcast::Sender<SyncMessage>,
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(128);
        Self { tx }
    }

    pub fn publish(&self, key: &str, origin: Uuid) {
        let _ = self.tx.send(SyncMessage {
            key: key.to_string(),
            origin,
            at: Utc::now(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncMessage> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = SyncBus::new();
        let mut rx = bus.subscribe();
        let origin = Uuid::new_v4();
        bus.publish("sendingJobs", origin);
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.key, "sendingJobs");
        assert_eq!(msg.origin, origin);
    }

    #[test]
    fn test_message_schema() {
        let msg = SyncMessage {
            key: "sendingJobs".into(),
            origin: Uuid::nil(),
            at: Utc::now(),
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["key"], "sendingJobs");
        assert!(v.get("origin").is_some() && v.get("at").is_some());
    }
}

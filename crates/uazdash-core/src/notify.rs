//! Operator-facing notifications.
//!
//! Every notification is logged through `tracing` and fanned out on a
//! broadcast channel so any number of front-ends (CLI printer, tests) can
//! observe it. Having no subscribers is not an error.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(
        level: NotificationLevel,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Cloneable handle for emitting notifications.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Warning | NotificationLevel::Error => {
                warn!("{}: {}", notification.title, notification.message)
            }
            _ => info!("{}: {}", notification.title, notification.message),
        }
        let _ = self.tx.send(notification);
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) {
        self.notify(Notification::new(NotificationLevel::Success, title, message));
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) {
        self.notify(Notification::new(NotificationLevel::Info, title, message));
    }

    pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) {
        self.notify(Notification::new(NotificationLevel::Warning, title, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_fans_out() {
        let notifier = Notifier::new();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();
        notifier.success("Envio concluído", "job 1");
        assert_eq!(a.recv().await.unwrap().level, NotificationLevel::Success);
        assert_eq!(b.recv().await.unwrap().title, "Envio concluído");
    }

    #[test]
    fn test_notify_without_subscribers() {
        Notifier::new().warning("nobody", "listening");
    }
}

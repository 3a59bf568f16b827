use thiserror::Error;

/// Top-level error type for uazdash.
#[derive(Debug, Error)]
pub enum UazError {
    /// Input rejected locally, before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// The instance is not connected to WhatsApp.
    #[error("instance {instance_id} is disconnected: {remediation}")]
    Disconnected {
        instance_id: i64,
        remediation: String,
    },

    /// The gateway rejected the instance token; the device must be paired again.
    #[error("invalid token for instance {instance_id}: reconnect it by scanning a new QR code")]
    InvalidToken { instance_id: i64 },

    /// The instance (or another resource) no longer exists on the backend.
    #[error("not found: {0}")]
    NotFound(String),

    /// The gateway is still generating or waiting on a pairing session (HTTP 409).
    #[error("pairing in progress")]
    PairingInProgress,

    /// The backend answered with `success: false` or an unexpected status.
    #[error("backend error: {0}")]
    Backend(String),

    /// Transport-level failure reaching the backend.
    #[error("http error: {0}")]
    Http(String),

    /// Persistent store error.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl UazError {
    /// Whether the error is a connectivity problem the operator must fix
    /// on the instance itself (reconnect or re-pair).
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Disconnected { .. } | Self::InvalidToken { .. })
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection state reported by the gateway for an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Connecting,
    #[default]
    Disconnected,
    #[serde(other)]
    Unknown,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Connecting => "connecting",
            Self::Disconnected => "disconnected",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A WhatsApp instance record owned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UazInstance {
    pub id: i64,
    pub name: String,
    /// Gateway token of the instance session.
    #[serde(default)]
    pub token: String,
    /// Paired phone number (owner JID user part), once known.
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub status: ConnectionStatus,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UazInstance {
    /// Phone number reduced to digits, if any.
    pub fn normalized_phone(&self) -> Option<String> {
        let digits: String = self
            .phone_number
            .as_deref()?
            .chars()
            .take_while(|c| *c != '@' && *c != ':')
            .filter(char::is_ascii_digit)
            .collect();
        (!digits.is_empty()).then_some(digits)
    }

    /// Whether both records point at the same WhatsApp account.
    pub fn shares_phone_with(&self, other: &UazInstance) -> bool {
        match (self.normalized_phone(), other.normalized_phone()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Live status of one instance, as returned by `/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    #[serde(default)]
    pub status: ConnectionStatus,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub logged_in: bool,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub profile_name: Option<String>,
}

impl InstanceStatus {
    /// Able to send: the gateway reports `connected`, or the socket is up
    /// and the session is logged in.
    pub fn is_ready(&self) -> bool {
        self.status.is_connected() || (self.connected && self.logged_in)
    }
}

/// QR pairing payload. `qrcode` is either raw QR text or a
/// `data:image/png;base64,...` URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCode {
    #[serde(default)]
    pub qrcode: Option<String>,
    #[serde(default)]
    pub paircode: Option<String>,
    #[serde(default)]
    pub connected: bool,
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Media attachment kinds accepted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Document,
    Audio,
}

impl MediaKind {
    /// Largest upload accepted for this kind, in bytes.
    pub fn max_bytes(self) -> u64 {
        const MB: u64 = 1024 * 1024;
        match self {
            Self::Image => 5 * MB,
            Self::Video | Self::Audio => 16 * MB,
            Self::Document => 100 * MB,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Document => "document",
            Self::Audio => "audio",
        }
    }
}

/// Interactive menu flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuType {
    Button,
    List,
    Poll,
}

/// Where a media file comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    /// Publicly reachable URL.
    Url(String),
    /// Inline bytes, sent base64-encoded.
    Inline {
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

/// A carousel card button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselButton {
    pub id: String,
    pub text: String,
    /// REPLY, URL, CALL or COPY.
    #[serde(rename = "type")]
    pub kind: String,
}

/// One card of a carousel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselCard {
    pub text: String,
    pub image: String,
    pub buttons: Vec<CarouselButton>,
}

/// One block of an outbound send. A job carries one or more blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text {
        text: String,
    },
    Media {
        kind: MediaKind,
        source: MediaSource,
        caption: Option<String>,
    },
    Menu {
        menu_type: MenuType,
        text: String,
        choices: Vec<String>,
        footer_text: Option<String>,
        list_button: Option<String>,
        selectable_count: Option<u32>,
    },
    Carousel {
        text: String,
        cards: Vec<CarouselCard>,
    },
}

impl OutboundMessage {
    /// Path suffix of the send endpoint: `send-{endpoint}`.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Media { kind, .. } => kind.as_str(),
            Self::Menu { .. } => "menu",
            Self::Carousel { .. } => "carousel",
        }
    }

    /// Text a typing indicator should be simulated for, if any.
    pub fn typed_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Media { caption, .. } => caption.as_deref(),
            Self::Menu { text, .. } | Self::Carousel { text, .. } => Some(text),
        }
    }
}

/// Acknowledgement of one send call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Backend record of a past send attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    pub id: i64,
    pub instance_id: i64,
    pub phone_number: String,
    pub message_type: String,
    pub status: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// Time range for a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRange {
    Today,
    Last7Days,
    Last30Days,
    Custom { start: NaiveDate, end: NaiveDate },
}

/// History query: a range plus a row limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryFilter {
    pub range: HistoryRange,
    pub limit: u32,
}

pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

impl HistoryFilter {
    pub fn new(range: HistoryRange) -> Self {
        Self {
            range,
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Inclusive `(startDate, endDate)` for a given "today".
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self.range {
            HistoryRange::Today => (today, today),
            HistoryRange::Last7Days => (today - chrono::Duration::days(6), today),
            HistoryRange::Last30Days => (today - chrono::Duration::days(29), today),
            HistoryRange::Custom { start, end } => {
                if start <= end {
                    (start, end)
                } else {
                    (end, start)
                }
            }
        }
    }

    /// Query string pairs for `/uaz/messages/history`.
    pub fn query(&self, today: NaiveDate) -> Vec<(&'static str, String)> {
        let (start, end) = self.bounds(today);
        vec![
            ("limit", self.limit.to_string()),
            ("startDate", start.format("%Y-%m-%d").to_string()),
            ("endDate", end.format("%Y-%m-%d").to_string()),
        ]
    }
}

impl std::str::FromStr for HistoryRange {
    type Err = String;

    /// Accepts `today`, `7d`, `30d`, or `YYYY-MM-DD..YYYY-MM-DD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "today" | "hoje" => Ok(Self::Today),
            "7d" | "week" => Ok(Self::Last7Days),
            "30d" | "month" => Ok(Self::Last30Days),
            other => {
                let (a, b) = other
                    .split_once("..")
                    .ok_or_else(|| format!("invalid history range: {other}"))?;
                let parse = |v: &str| {
                    NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
                        .map_err(|e| format!("invalid date '{v}': {e}"))
                };
                Ok(Self::Custom {
                    start: parse(a)?,
                    end: parse(b)?,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_history_bounds() {
        let today = day("2026-03-10");
        let f = HistoryFilter::new(HistoryRange::Last7Days);
        assert_eq!(f.bounds(today), (day("2026-03-04"), today));
        let f = HistoryFilter::new(HistoryRange::Today);
        assert_eq!(f.bounds(today), (today, today));
    }

    #[test]
    fn test_custom_range_is_ordered() {
        let f = HistoryFilter::new(HistoryRange::Custom {
            start: day("2026-02-10"),
            end: day("2026-02-01"),
        });
        assert_eq!(
            f.bounds(day("2026-03-10")),
            (day("2026-02-01"), day("2026-02-10"))
        );
    }

    #[test]
    fn test_history_query_params() {
        let f = HistoryFilter {
            range: HistoryRange::Last30Days,
            limit: 50,
        };
        let q = f.query(day("2026-03-30"));
        assert_eq!(q[0], ("limit", "50".to_string()));
        assert_eq!(q[1], ("startDate", "2026-03-01".to_string()));
        assert_eq!(q[2], ("endDate", "2026-03-30".to_string()));
    }

    #[test]
    fn test_parse_range() {
        assert_eq!("7d".parse::<HistoryRange>().unwrap(), HistoryRange::Last7Days);
        assert_eq!(
            "2026-01-01..2026-01-31".parse::<HistoryRange>().unwrap(),
            HistoryRange::Custom {
                start: day("2026-01-01"),
                end: day("2026-01-31"),
            }
        );
        assert!("yesterday".parse::<HistoryRange>().is_err());
    }

    #[test]
    fn test_endpoints() {
        let m = OutboundMessage::Media {
            kind: MediaKind::Document,
            source: MediaSource::Url("https://x/y.pdf".into()),
            caption: None,
        };
        assert_eq!(m.endpoint(), "document");
        assert!(m.typed_text().is_none());
        let t = OutboundMessage::Text { text: "oi".into() };
        assert_eq!(t.endpoint(), "text");
        assert_eq!(t.typed_text(), Some("oi"));
    }
}

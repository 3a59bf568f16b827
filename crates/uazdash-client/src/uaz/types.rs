//! Wire types of the UAZ REST backend and envelope decoding.

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uazdash_core::error::UazError;
use uazdash_core::message::{HistoryMessage, MediaSource, OutboundMessage};

/// `{ success, data | error }` wrapper carried by every response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// History responses come either as a bare list or wrapped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum HistoryData {
    List(Vec<HistoryMessage>),
    Wrapped { messages: Vec<HistoryMessage> },
}

impl HistoryData {
    pub fn into_messages(self) -> Vec<HistoryMessage> {
        match self {
            Self::List(m) | Self::Wrapped { messages: m } => m,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ImportRequest<'a> {
    pub tokens: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImportResult {
    #[serde(default)]
    pub imported: u32,
}

/// Context used to classify an error response.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallContext<'a> {
    pub what: &'a str,
    pub instance_id: Option<i64>,
}

/// Classify a response by HTTP status and envelope.
///
/// - 404 → `NotFound` (the instance was deleted)
/// - 409 → `PairingInProgress`
/// - `success: false` mentioning "invalid token" → `InvalidToken`
/// - any other failure → `Backend`
pub(crate) fn decode_envelope<T: DeserializeOwned>(
    status: u16,
    body: &str,
    ctx: CallContext<'_>,
) -> Result<Option<T>, UazError> {
    match status {
        404 => return Err(UazError::NotFound(ctx.what.to_string())),
        409 => return Err(UazError::PairingInProgress),
        _ => {}
    }

    if (200..300).contains(&status) && body.trim().is_empty() {
        return Ok(None);
    }

    let envelope: ApiEnvelope<T> = match serde_json::from_str(body) {
        Ok(env) => env,
        Err(e) => {
            return Err(UazError::Backend(if (200..300).contains(&status) {
                format!("{}: malformed response: {e}", ctx.what)
            } else {
                format!("{}: HTTP {status}: {}", ctx.what, snippet(body))
            }))
        }
    };

    if !envelope.success || !(200..300).contains(&status) {
        let reason = envelope
            .error
            .or(envelope.message)
            .unwrap_or_else(|| format!("HTTP {status}"));
        if reason.to_lowercase().contains("invalid token") {
            return Err(UazError::InvalidToken {
                instance_id: ctx.instance_id.unwrap_or_default(),
            });
        }
        return Err(UazError::Backend(format!("{}: {reason}", ctx.what)));
    }

    Ok(envelope.data)
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// JSON body of `POST /uaz/instances/{id}/send-{kind}`.
pub(crate) fn send_body(number: &str, message: &OutboundMessage, typing_delay_ms: u64) -> Value {
    let mut body = match message {
        OutboundMessage::Text { text } => json!({ "text": text }),
        OutboundMessage::Media {
            kind,
            source,
            caption,
        } => {
            let mut v = json!({ "type": kind.as_str() });
            match source {
                MediaSource::Url(url) => {
                    v["file"] = json!(url);
                }
                MediaSource::Inline {
                    file_name,
                    mime_type,
                    bytes,
                } => {
                    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                    v["file"] = json!(format!("data:{mime_type};base64,{encoded}"));
                    v["docName"] = json!(file_name);
                }
            }
            if let Some(c) = caption {
                v["caption"] = json!(c);
            }
            v
        }
        OutboundMessage::Menu {
            menu_type,
            text,
            choices,
            footer_text,
            list_button,
            selectable_count,
        } => {
            let mut v = json!({
                "type": menu_type,
                "text": text,
                "choices": choices,
            });
            if let Some(f) = footer_text {
                v["footerText"] = json!(f);
            }
            if let Some(l) = list_button {
                v["listButton"] = json!(l);
            }
            if let Some(n) = selectable_count {
                v["selectableCount"] = json!(n);
            }
            v
        }
        OutboundMessage::Carousel { text, cards } => json!({
            "text": text,
            "carousel": cards,
        }),
    };
    body["number"] = json!(number);
    body["delay"] = json!(typing_delay_ms);
    body
}

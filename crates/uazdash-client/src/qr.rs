//! Pairing QR rendering.
//!
//! The backend hands out the pairing code either as the raw QR text the
//! gateway produced or as a `data:image/png;base64,...` URL of an already
//! rendered image. Raw text is drawn in the terminal; images are decoded so
//! the caller can write them to a file.

use base64::Engine;
use uazdash_core::error::UazError;

/// How a QR payload should be shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrDisplay {
    /// Ready-to-print terminal rendering.
    Terminal(String),
    /// Decoded image bytes and their file extension.
    Image { bytes: Vec<u8>, extension: String },
}

/// Turn a backend QR payload into something displayable.
pub fn prepare_qr(payload: &str) -> Result<QrDisplay, UazError> {
    match decode_data_url(payload)? {
        Some((mime, bytes)) => {
            let extension = mime
                .strip_prefix("image/")
                .unwrap_or("png")
                .trim_end_matches("+xml")
                .to_string();
            Ok(QrDisplay::Image { bytes, extension })
        }
        None => Ok(QrDisplay::Terminal(generate_qr_terminal(payload)?)),
    }
}

/// Split a base64 `data:` URL into its MIME type and bytes. Returns
/// `Ok(None)` for anything that is not a data URL.
pub fn decode_data_url(payload: &str) -> Result<Option<(String, Vec<u8>)>, UazError> {
    let Some(rest) = payload.trim().strip_prefix("data:") else {
        return Ok(None);
    };
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| UazError::Backend("qrcode data URL has no payload".into()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| UazError::Backend(format!("unsupported qrcode encoding: {meta}")))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| UazError::Backend(format!("qrcode data URL is not valid base64: {e}")))?;
    Ok(Some((mime.to_string(), bytes)))
}

/// Generate a compact QR code for terminal display using Unicode half-block characters.
///
/// Packs two rows of modules into one line of text using `▀`, `▄`, `█`, and space.
pub fn generate_qr_terminal(qr_data: &str) -> Result<String, UazError> {
    use qrcode::{Color, EcLevel, QrCode};

    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| UazError::Validation(format!("QR generation failed: {e}")))?;

    let width = code.width();
    let colors: Vec<Color> = code.into_colors();
    let is_dark = |row: usize, col: usize| -> bool {
        row < width && col < width && colors[row * width + col] == Color::Dark
    };

    let mut out = String::new();
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (is_dark(row, col), is_dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }

    Ok(out)
}

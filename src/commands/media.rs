//! Building outbound blocks from command-line arguments.

use anyhow::Context;
use std::path::Path;
use uazdash_core::message::{CarouselCard, MediaKind, MediaSource};

/// MIME type guessed from a file extension.
pub fn mime_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

/// A media argument is either an http(s) URL or a local file path.
pub async fn load_media(kind: MediaKind, source: &str) -> anyhow::Result<MediaSource> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return Ok(MediaSource::Url(source.to_string()));
    }
    let path = Path::new(source);
    let meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("cannot read {source}"))?;
    // Reject oversized files without reading them.
    if meta.len() > kind.max_bytes() {
        anyhow::bail!(
            "{source} is {} bytes; {} uploads are limited to {} MB",
            meta.len(),
            kind.as_str(),
            kind.max_bytes() / (1024 * 1024)
        );
    }
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {source}"))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string();
    Ok(MediaSource::Inline {
        file_name,
        mime_type: mime_for(path),
        bytes,
    })
}

/// Carousel cards from a JSON file holding an array of cards.
pub async fn load_cards(path: &Path) -> anyhow::Result<Vec<CarouselCard>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid carousel file {}", path.display()))
}

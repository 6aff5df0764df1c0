//! Attachment download and storage.
//!
//! Only images and videos are kept. Audio, documents and stickers of other
//! types are skipped, and a failed download simply means no media.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::domain::{AppError, MessagingClient, RawMessage, Result};
use crate::infrastructure::ArchiveLayout;

/// Extension used when the content type is unknown.
const FALLBACK_EXTENSION: &str = "bin";

/// Preferred extensions for the common types.
const KNOWN_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", "jpeg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("video/mp4", "mp4"),
    ("video/3gpp", "3gp"),
    ("video/quicktime", "mov"),
    ("video/webm", "webm"),
];

/// Content type without parameters, lowercased.
fn essence(mimetype: &str) -> String {
    mimetype
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether attachments of this content type are archived.
#[must_use]
pub fn is_archived_type(mimetype: &str) -> bool {
    let essence = essence(mimetype);
    essence.starts_with("image/") || essence.starts_with("video/")
}

/// File extension for a content type.
#[must_use]
pub fn extension_for(mimetype: &str) -> String {
    let essence = essence(mimetype);
    if let Some((_, ext)) = KNOWN_EXTENSIONS.iter().find(|(mt, _)| *mt == essence) {
        return (*ext).to_string();
    }
    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map_or_else(|| FALLBACK_EXTENSION.to_string(), |ext| (*ext).to_string())
}

/// Stores qualifying attachments under `media/<chat>/`.
pub struct MediaMaterializer<'a, C: MessagingClient + ?Sized> {
    client: &'a C,
    layout: &'a ArchiveLayout,
}

impl<'a, C: MessagingClient + ?Sized> MediaMaterializer<'a, C> {
    pub const fn new(client: &'a C, layout: &'a ArchiveLayout) -> Self {
        Self { client, layout }
    }

    /// Download and persist the message's attachment.
    ///
    /// Returns the absolute path of the stored file, or `None` when there is
    /// nothing to store: no attachment, a failed download, or a content type
    /// other than image/video.
    ///
    /// # Errors
    /// Returns error if the payload is not valid base64 or cannot be written.
    pub async fn materialize(&self, message: &RawMessage, chat_id: &str) -> Result<Option<PathBuf>> {
        let Some(message_id) = message.id() else {
            return Ok(None);
        };

        let media = match self.client.download_media(chat_id, message).await {
            Ok(Some(media)) => media,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::debug!(chat = chat_id, message_id, error = %e, "Media download failed");
                return Ok(None);
            }
        };

        let mimetype = media.mimetype.as_deref().unwrap_or_default();
        if !is_archived_type(mimetype) {
            tracing::trace!(chat = chat_id, message_id, mimetype, "Skipping media type");
            return Ok(None);
        }

        let bytes = STANDARD.decode(media.data.trim()).map_err(|e| AppError::Media {
            message: format!("Invalid base64 payload for {message_id}: {e}"),
        })?;

        let path = self
            .layout
            .write_media(chat_id, message_id, &extension_for(mimetype), &bytes)
            .await?;

        tracing::debug!(chat = chat_id, path = %path.display(), bytes = bytes.len(), "Saved media");

        Ok(Some(path))
    }
}

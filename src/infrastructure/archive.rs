//! On-disk archive layout.
//!
//! ```text
//! <root>/index.json
//! <root>/chats/<chat>/chat.json
//! <root>/chats/<chat>/messages.jsonl
//! <root>/media/<chat>/<message>.<ext>
//! ```
//!
//! Chat and message ids are passed through [`sanitize`] before they become
//! path components. Every chat owns its own subtree, so concurrent chat
//! exports never touch the same file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::domain::{sanitize, AppError, ChatSummary, MessageRecord, Result};

const INDEX_FILE: &str = "index.json";
const CHATS_DIR: &str = "chats";
const MEDIA_DIR: &str = "media";
const CHAT_META_FILE: &str = "chat.json";
const MESSAGES_FILE: &str = "messages.jsonl";

/// Paths of one archive root.
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
}

impl ArchiveLayout {
    /// Anchor the layout at `root`, made absolute against the working dir.
    ///
    /// # Errors
    /// Returns error if the current directory cannot be determined.
    pub fn new(root: &Path) -> Result<Self> {
        let root = std::path::absolute(root)
            .map_err(|e| AppError::io(format!("Invalid archive root: {}", root.display()), e))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    #[must_use]
    pub fn chat_dir(&self, chat_id: &str) -> PathBuf {
        self.root.join(CHATS_DIR).join(sanitize(chat_id))
    }

    #[must_use]
    pub fn media_dir(&self, chat_id: &str) -> PathBuf {
        self.root.join(MEDIA_DIR).join(sanitize(chat_id))
    }

    #[must_use]
    pub fn media_path(&self, chat_id: &str, message_id: &str, ext: &str) -> PathBuf {
        self.media_dir(chat_id)
            .join(format!("{}.{ext}", sanitize(message_id)))
    }

    /// Create the archive root if needed.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub async fn ensure_root(&self) -> Result<()> {
        ensure_dir(&self.root).await
    }

    /// Overwrite `index.json` with the exported chats.
    ///
    /// # Errors
    /// Returns error if serialization or the write fails.
    pub async fn write_index(&self, chats: &[ChatSummary]) -> Result<()> {
        write_json(&self.index_path(), &chats).await
    }

    /// Create the chat directory and overwrite its `chat.json`.
    ///
    /// # Errors
    /// Returns error if the directory or file cannot be written.
    pub async fn write_chat_meta(&self, summary: &ChatSummary) -> Result<()> {
        let dir = self.chat_dir(&summary.id);
        ensure_dir(&dir).await?;
        write_json(&dir.join(CHAT_META_FILE), summary).await
    }

    /// Open the chat's `messages.jsonl`, truncating any previous run.
    ///
    /// # Errors
    /// Returns error if the file cannot be created.
    pub async fn open_message_log(&self, chat_id: &str) -> Result<MessageLog> {
        let path = self.chat_dir(chat_id).join(MESSAGES_FILE);
        let file = File::create(&path)
            .await
            .map_err(|e| AppError::io(format!("Failed to create {}", path.display()), e))?;
        Ok(MessageLog {
            path,
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    /// Write an attachment, replacing any file of the same name.
    ///
    /// # Errors
    /// Returns error if the media directory or file cannot be written.
    pub async fn write_media(
        &self,
        chat_id: &str,
        message_id: &str,
        ext: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        ensure_dir(&self.media_dir(chat_id)).await?;
        let path = self.media_path(chat_id, message_id, ext);
        fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))?;
        Ok(path)
    }
}

/// Append-only JSONL stream of one chat's messages.
pub struct MessageLog {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

impl MessageLog {
    /// Append one record as a single line.
    ///
    /// # Errors
    /// Returns error if serialization or the write fails.
    pub async fn append(&mut self, record: &MessageRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record).map_err(AppError::json_parse)?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .await
            .map_err(|e| AppError::io(format!("Failed to append to {}", self.path.display()), e))?;
        self.lines += 1;
        Ok(())
    }

    #[must_use]
    pub const fn lines(&self) -> usize {
        self.lines
    }

    /// Flush buffered lines and close the file.
    ///
    /// # Errors
    /// Returns error if the flush fails.
    pub async fn close(mut self) -> Result<()> {
        self.writer
            .shutdown()
            .await
            .map_err(|e| AppError::io(format!("Failed to close {}", self.path.display()), e))
    }
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::io(format!("Failed to create directory {}", dir.display()), e))
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value).map_err(AppError::json_parse)?;
    fs::write(path, bytes)
        .await
        .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))
}

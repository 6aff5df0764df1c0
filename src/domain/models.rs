//! Domain models for exported chat data.
//!
//! Incoming types (`Chat`, `RawMessage`, `MediaPayload`) mirror what the
//! messaging client reports and tolerate missing fields. Outgoing types
//! (`ChatSummary`, `MessageRecord`) fix the archive's JSON shape.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat id of the account's own "self" conversation, never exported.
pub const SELF_CHAT_ID: &str = "0@c.us";

/// Address suffixes of conversations that are not one-to-one.
pub const NON_DIRECT_SUFFIXES: &[&str] = &["@g.us", "@broadcast", "@newsletter"];

/// A conversation as listed by the messaging client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Opaque, globally unique id, e.g. `34600111222@c.us`.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub formatted_title: Option<String>,
    #[serde(default)]
    pub is_group: bool,
}

impl Chat {
    /// Build a direct chat for fixtures.
    #[cfg(test)]
    #[must_use]
    pub fn direct(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            formatted_title: None,
            is_group: false,
        }
    }

    /// Name shown to the user, falling back to the formatted title.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.formatted_title.as_deref())
            .unwrap_or("")
    }

    /// Whether this chat is a one-to-one conversation worth exporting.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        !self.is_group
            && self.id != SELF_CHAT_ID
            && !NON_DIRECT_SUFFIXES.iter().any(|s| self.id.ends_with(s))
    }

    /// Metadata written to `chat.json` and `index.json`.
    #[must_use]
    pub fn summary(&self) -> ChatSummary {
        ChatSummary {
            id: self.id.clone(),
            name: self.display_name().to_string(),
            is_group: self.is_group,
        }
    }
}

/// Persisted chat metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub name: String,
    pub is_group: bool,
}

/// Message id as reported by the client: either already serialized or the
/// structured form carrying `_serialized` and/or the bare `id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Serialized(String),
    Parts {
        #[serde(default, rename = "_serialized")]
        serialized: Option<String>,
        #[serde(default)]
        id: Option<String>,
    },
    /// Any other shape. Such a message has no usable id and is dropped,
    /// without failing the rest of its page.
    Malformed(serde::de::IgnoredAny),
}

impl MessageId {
    fn as_str(&self) -> Option<&str> {
        match self {
            Self::Serialized(s) => Some(s.as_str()),
            Self::Parts { serialized, id } => serialized
                .as_deref()
                .filter(|s| !s.is_empty())
                .or(id.as_deref()),
            Self::Malformed(_) => None,
        }
        .filter(|s| !s.is_empty())
    }
}

/// A message as returned by one page fetch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default)]
    pub id: Option<MessageId>,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub has_media: bool,
}

impl RawMessage {
    /// The message's serialized id, if it has a usable one.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_ref().and_then(MessageId::as_str)
    }

    /// Build the archive record for this message.
    ///
    /// Returns `None` for messages without an id, which are never written.
    #[must_use]
    pub fn to_record(&self, media_path: Option<String>) -> Option<MessageRecord> {
        let id = self.id()?;
        Some(MessageRecord {
            id: id.to_string(),
            kind: self.kind.clone(),
            timestamp: self.timestamp,
            from: self.from.clone(),
            to: self.to.clone(),
            author: self.author.clone().filter(|a| !a.is_empty()),
            body: self.body.clone().unwrap_or_default(),
            has_media: media_path.is_some(),
            media_path,
        })
    }
}

/// One line of `messages.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: i64,
    pub from: String,
    pub to: String,
    pub author: Option<String>,
    pub body: String,
    /// True only when the attachment was actually stored.
    pub has_media: bool,
    pub media_path: Option<String>,
}

/// A downloaded attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    #[serde(default)]
    pub mimetype: Option<String>,
    /// Base64-encoded bytes.
    pub data: String,
}

/// Parameters of one page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    pub limit: usize,
    /// Only return messages older than this message id.
    pub before: Option<String>,
}

/// Lifecycle notifications emitted by the messaging client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A pairing QR code is being shown.
    Qr,
    Ready,
    Disconnected(Option<String>),
    AuthFailure(Option<String>),
    /// The client's browser window was closed.
    WindowClosed,
}

/// Why pagination of a chat stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationEnd {
    /// The client returned an empty page.
    #[default]
    Exhausted,
    DeadlineReached,
    /// A page fetch failed; treated as the end of the chat.
    FetchFailed,
    /// The cursor did not move backward.
    CursorStalled,
    SkippedGroup,
}

/// Outcome of exporting one chat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatExportReport {
    pub chat_id: String,
    pub pages: usize,
    pub messages_written: usize,
    pub duplicates_skipped: usize,
    pub media_saved: usize,
    pub end: PaginationEnd,
}

/// Totals for one export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportStats {
    pub started_at: DateTime<Utc>,
    /// Chats listed by the client.
    pub chats_listed: usize,
    /// Chats that passed the direct-chat filter.
    pub chats_eligible: usize,
    pub chats_exported: usize,
    pub chats_failed: usize,
    /// Chats whose pagination was cut by the deadline.
    pub chats_truncated: usize,
    pub messages_written: usize,
    pub media_saved: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl Default for ExportStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            chats_listed: 0,
            chats_eligible: 0,
            chats_exported: 0,
            chats_failed: 0,
            chats_truncated: 0,
            messages_written: 0,
            media_saved: 0,
            elapsed: Duration::ZERO,
        }
    }
}

impl ExportStats {
    /// Fold one chat's report into the totals.
    pub fn record(&mut self, report: &ChatExportReport) {
        self.chats_exported += 1;
        self.messages_written += report.messages_written;
        self.media_saved += report.media_saved;
        if report.end == PaginationEnd::DeadlineReached {
            self.chats_truncated += 1;
        }
    }
}

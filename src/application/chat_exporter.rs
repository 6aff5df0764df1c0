//! Paginated export of a single chat.
//!
//! Pages are fetched newest-first and walked backward with a cursor (the id
//! of the oldest message seen so far). Each message id is written at most
//! once per run, even when the client returns overlapping pages.

use std::collections::HashSet;

use tokio::time::Instant;

use crate::domain::{
    Chat, ChatExportReport, FetchQuery, MessagingClient, PaginationEnd, Result,
};
use crate::infrastructure::{ArchiveLayout, MessageLog};

use super::media::MediaMaterializer;

/// Exports chats into an archive through a shared client.
pub struct ChatExporter<'a, C: MessagingClient + ?Sized> {
    client: &'a C,
    layout: &'a ArchiveLayout,
    page_size: usize,
}

impl<'a, C: MessagingClient + ?Sized> ChatExporter<'a, C> {
    pub const fn new(client: &'a C, layout: &'a ArchiveLayout, page_size: usize) -> Self {
        Self {
            client,
            layout,
            page_size,
        }
    }

    /// Export one chat until its history is exhausted or `deadline` passes.
    ///
    /// `chat.json` is written before any message is fetched, and
    /// `messages.jsonl` is rebuilt from scratch. Hitting the deadline is not
    /// an error: the log simply holds what was fetched so far.
    ///
    /// # Errors
    /// Returns error if the chat's files cannot be written.
    pub async fn export_chat(&self, chat: &Chat, deadline: Instant) -> Result<ChatExportReport> {
        let mut report = ChatExportReport {
            chat_id: chat.id.clone(),
            ..ChatExportReport::default()
        };

        if chat.is_group {
            report.end = PaginationEnd::SkippedGroup;
            return Ok(report);
        }

        self.layout.write_chat_meta(&chat.summary()).await?;
        let mut log = self.layout.open_message_log(&chat.id).await?;

        let outcome = self.paginate(chat, deadline, &mut log, &mut report).await;
        let lines = log.lines();
        let closed = log.close().await;
        outcome?;
        closed?;

        tracing::debug!(
            chat = %chat.id,
            pages = report.pages,
            lines,
            duplicates = report.duplicates_skipped,
            media = report.media_saved,
            end = ?report.end,
            "Chat exported"
        );

        Ok(report)
    }

    async fn paginate(
        &self,
        chat: &Chat,
        deadline: Instant,
        log: &mut MessageLog,
        report: &mut ChatExportReport,
    ) -> Result<()> {
        let materializer = MediaMaterializer::new(self.client, self.layout);
        let mut seen: HashSet<String> = HashSet::new();
        let mut before: Option<String> = None;

        report.end = loop {
            if Instant::now() >= deadline {
                break PaginationEnd::DeadlineReached;
            }

            let query = FetchQuery {
                limit: self.page_size,
                before: before.clone(),
            };
            let page = match self.client.fetch_messages(&chat.id, query).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(chat = %chat.id, error = %e, "Message fetch failed, ending chat");
                    break PaginationEnd::FetchFailed;
                }
            };
            if page.is_empty() {
                break PaginationEnd::Exhausted;
            }
            report.pages += 1;

            for message in &page {
                let Some(id) = message.id() else {
                    tracing::trace!(chat = %chat.id, "Dropping message without id");
                    continue;
                };
                if !seen.insert(id.to_string()) {
                    report.duplicates_skipped += 1;
                    continue;
                }

                let media_path = if message.has_media {
                    match materializer.materialize(message, &chat.id).await {
                        Ok(path) => path,
                        Err(e) => {
                            tracing::debug!(chat = %chat.id, message_id = id, error = %e, "Media not saved");
                            None
                        }
                    }
                } else {
                    None
                };
                if media_path.is_some() {
                    report.media_saved += 1;
                }

                let media_path = media_path.map(|p| p.to_string_lossy().into_owned());
                if let Some(record) = message.to_record(media_path) {
                    log.append(&record).await?;
                    report.messages_written += 1;
                }
            }

            // Pages are newest-first, so the last id is the oldest one.
            let next = page.iter().rev().find_map(|m| m.id()).map(String::from);
            match next {
                Some(cursor) if before.as_deref() != Some(cursor.as_str()) => {
                    before = Some(cursor);
                }
                _ => break PaginationEnd::CursorStalled,
            }
        };

        Ok(())
    }
}

//! Whole-account export.
//!
//! Lists chats once the client has synced, keeps the direct ones, writes the
//! index and exports every chat concurrently against one shared deadline.

use futures::future::join_all;
use tokio::time::Instant;

use crate::domain::{
    AppConfig, Chat, ChatSummary, ExportStats, MessagingClient, PaginationEnd, Result,
};
use crate::infrastructure::ArchiveLayout;

use super::chat_exporter::ChatExporter;
use super::progress::ProgressBoard;
use super::sync_waiter::SyncWaiter;

/// Keep only the one-to-one chats worth exporting.
#[must_use]
pub fn eligible_chats(chats: Vec<Chat>) -> Vec<Chat> {
    chats.into_iter().filter(Chat::is_eligible).collect()
}

pub struct ExportOrchestrator<'a, C: MessagingClient + ?Sized> {
    client: &'a C,
    config: &'a AppConfig,
    layout: ArchiveLayout,
    board: ProgressBoard,
}

impl<'a, C: MessagingClient + ?Sized> ExportOrchestrator<'a, C> {
    /// Create an orchestrator writing to `config.export.output_dir` and
    /// drawing its bars on `board`.
    ///
    /// # Errors
    /// Returns error if the archive root cannot be resolved.
    pub fn new(client: &'a C, config: &'a AppConfig, board: ProgressBoard) -> Result<Self> {
        Ok(Self {
            client,
            config,
            layout: ArchiveLayout::new(&config.export.output_dir)?,
            board,
        })
    }

    #[must_use]
    pub const fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// Export every eligible chat, stopping pagination at `deadline`.
    ///
    /// A chat that fails is logged and counted; it never stops the others.
    ///
    /// # Errors
    /// Returns error if the archive root or index cannot be written, or the
    /// client cannot list chats.
    pub async fn export_all(&self, deadline: Instant) -> Result<ExportStats> {
        let started = Instant::now();
        let mut stats = ExportStats::default();

        self.layout.ensure_root().await?;

        SyncWaiter::new(&self.config.sync, &self.board)
            .wait_for_sync(self.client, self.config.sync.max_wait())
            .await;

        let chats = self.client.get_chats().await?;
        stats.chats_listed = chats.len();
        tracing::info!(chats = chats.len(), "Chats loaded: {}", chats.len());

        let direct = eligible_chats(chats);
        stats.chats_eligible = direct.len();

        let index: Vec<ChatSummary> = direct.iter().map(Chat::summary).collect();
        self.layout.write_index(&index).await?;

        tracing::info!(
            chats = direct.len(),
            root = %self.layout.root().display(),
            "Exporting {} direct chats concurrently",
            direct.len()
        );

        let exporter = ChatExporter::new(self.client, &self.layout, self.config.export.page_size);
        let results = join_all(
            direct
                .iter()
                .map(|chat| exporter.export_chat(chat, deadline)),
        )
        .await;

        for (chat, result) in direct.iter().zip(results) {
            match result {
                Ok(report) => {
                    if report.end == PaginationEnd::DeadlineReached {
                        tracing::info!(
                            chat = %report.chat_id,
                            pages = report.pages,
                            messages = report.messages_written,
                            "Chat cut by deadline"
                        );
                    }
                    stats.record(&report);
                }
                Err(e) => {
                    stats.chats_failed += 1;
                    tracing::warn!(chat = %chat.id, error = %e, "Chat export failed");
                }
            }
        }

        stats.elapsed = started.elapsed();
        tracing::info!(
            exported = stats.chats_exported,
            failed = stats.chats_failed,
            truncated = stats.chats_truncated,
            messages = stats.messages_written,
            media = stats.media_saved,
            "Export finished"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::MessageRecord;
    use crate::infrastructure::fake_client::{message, page, FakeClient};
    use tempfile::tempdir;

    fn test_config(root: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.export.output_dir = root.to_path_buf();
        config.sync.poll_interval_ms = 1;
        config.ui.progress = false;
        config
    }

    fn orchestrator<'a>(
        client: &'a FakeClient,
        config: &'a AppConfig,
    ) -> ExportOrchestrator<'a, FakeClient> {
        ExportOrchestrator::new(client, config, ProgressBoard::disabled()).unwrap()
    }

    fn sample_chats() -> Vec<Chat> {
        vec![
            Chat::direct("1@c.us", "Ana"),
            Chat {
                is_group: true,
                ..Chat::direct("1@g.us", "Family")
            },
            Chat::direct("0@c.us", "Me"),
            Chat::direct("x@broadcast", "Status"),
        ]
    }

    #[test]
    fn test_filter_keeps_only_direct_chats() {
        let eligible = eligible_chats(sample_chats());
        let ids: Vec<&str> = eligible.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1@c.us"]);
    }

    #[tokio::test]
    async fn test_index_lists_eligible_chats() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let client = FakeClient::new()
            .with_chats(sample_chats())
            .with_pages("1@c.us", vec![page(&["2", "1"])]);

        let orchestrator = orchestrator(&client, &config);
        let stats = orchestrator
            .export_all(Instant::now() + Duration::from_secs(60))
            .await
            .unwrap();

        let index = std::fs::read_to_string(dir.path().join("index.json")).unwrap();
        assert_eq!(index, r#"[{"id":"1@c.us","name":"Ana","isGroup":false}]"#);
        assert!(!dir.path().join("chats").join("1@g.us").exists());
        assert_eq!(stats.chats_listed, 4);
        assert_eq!(stats.chats_eligible, 1);
        assert_eq!(stats.chats_exported, 1);
        assert_eq!(stats.messages_written, 2);
    }

    #[tokio::test]
    async fn test_failing_chat_does_not_stop_siblings() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        // A plain file where the chat directory should go makes that chat fail.
        std::fs::create_dir_all(dir.path().join("chats")).unwrap();
        std::fs::write(dir.path().join("chats").join("2@c.us"), b"in the way").unwrap();

        let client = FakeClient::new()
            .with_chats(vec![
                Chat::direct("1@c.us", "Ana"),
                Chat::direct("2@c.us", "Bruno"),
                Chat::direct("3@c.us", "Carla"),
            ])
            .with_pages("1@c.us", vec![page(&["a3", "a2"]), page(&["a1"])])
            .with_pages("2@c.us", vec![page(&["b1"])])
            .with_pages("3@c.us", vec![page(&["c2", "c1"])]);

        let orchestrator = orchestrator(&client, &config);
        let stats = orchestrator
            .export_all(Instant::now() + Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(stats.chats_failed, 1);
        assert_eq!(stats.chats_exported, 2);
        assert_eq!(stats.messages_written, 5);

        let lines = |id: &str| {
            std::fs::read_to_string(orchestrator.layout().chat_dir(id).join("messages.jsonl"))
                .unwrap()
                .lines()
                .count()
        };
        assert_eq!(lines("1@c.us"), 3);
        assert_eq!(lines("3@c.us"), 2);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_chat_failing_mid_pagination_does_not_stop_siblings() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        // Chat 2's log lands on a full disk: its first page fits in the write
        // buffer, the second one fails while the siblings are still paging.
        let chat_dir = dir.path().join("chats").join("2@c.us");
        std::fs::create_dir_all(&chat_dir).unwrap();
        std::os::unix::fs::symlink("/dev/full", chat_dir.join("messages.jsonl")).unwrap();

        let big_page: Vec<_> = (0..300).rev().map(|i| message(&format!("b{i}"))).collect();
        let client = FakeClient::new()
            .with_chats(vec![
                Chat::direct("1@c.us", "Ana"),
                Chat::direct("2@c.us", "Bruno"),
                Chat::direct("3@c.us", "Carla"),
            ])
            .with_pages(
                "1@c.us",
                vec![page(&["a5", "a4"]), page(&["a3", "a2"]), page(&["a1"])],
            )
            .with_pages("2@c.us", vec![page(&["b901", "b900"]), big_page])
            .with_pages(
                "3@c.us",
                vec![page(&["c5", "c4"]), page(&["c3", "c2"]), page(&["c1"])],
            )
            .with_fetch_delay(Duration::from_millis(5));

        let orchestrator = orchestrator(&client, &config);
        let stats = orchestrator
            .export_all(Instant::now() + Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(stats.chats_failed, 1);
        assert_eq!(stats.chats_exported, 2);
        assert_eq!(stats.messages_written, 10);
        assert!(client.queries("2@c.us").len() >= 2);
        assert!(chat_dir.join("chat.json").exists());

        for (id, prefix) in [("1@c.us", "a"), ("3@c.us", "c")] {
            let content = std::fs::read_to_string(
                orchestrator.layout().chat_dir(id).join("messages.jsonl"),
            )
            .unwrap();
            let ids: Vec<String> = content
                .lines()
                .map(|line| serde_json::from_str::<MessageRecord>(line).unwrap().id)
                .collect();
            let expected: Vec<String> = (1..=5).rev().map(|n| format!("{prefix}{n}")).collect();
            assert_eq!(ids, expected, "{id} must be complete");
        }
    }

    #[tokio::test]
    async fn test_chat_list_failure_is_fatal() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let client = FakeClient::new().with_failing_chat_list();

        let orchestrator = orchestrator(&client, &config);
        let result = orchestrator
            .export_all(Instant::now() + Duration::from_secs(60))
            .await;

        assert!(result.is_err());
        assert!(!dir.path().join("index.json").exists());
    }

    #[tokio::test]
    async fn test_expired_deadline_still_writes_metadata() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let client = FakeClient::new()
            .with_chats(vec![Chat::direct("1@c.us", "Ana")])
            .with_pages("1@c.us", vec![page(&["1"])]);

        let orchestrator = orchestrator(&client, &config);
        let stats = orchestrator.export_all(Instant::now()).await.unwrap();

        assert_eq!(stats.chats_truncated, 1);
        assert_eq!(stats.messages_written, 0);
        assert!(dir.path().join("chats").join("1@c.us").join("chat.json").exists());
    }
}

//! Scripted in-memory `MessagingClient` for tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio::sync::mpsc;

use crate::domain::models::MessageId;
use crate::domain::{
    AppError, Chat, ClientEvent, FetchQuery, MediaPayload, MessagingClient, RawMessage, Result,
};

/// A text message with the given id.
pub fn message(id: &str) -> RawMessage {
    RawMessage {
        id: Some(MessageId::Serialized(id.to_string())),
        kind: "chat".to_string(),
        timestamp: 1_700_000_000,
        from: "1@c.us".to_string(),
        to: "me@c.us".to_string(),
        author: None,
        body: Some(format!("body {id}")),
        has_media: false,
    }
}

/// A message that declares an attachment.
pub fn media_message(id: &str) -> RawMessage {
    RawMessage {
        kind: "image".to_string(),
        has_media: true,
        ..message(id)
    }
}

/// Messages with the given ids, in the given order.
pub fn page(ids: &[&str]) -> Vec<RawMessage> {
    ids.iter().map(|id| message(id)).collect()
}

enum PageScript {
    Page(Vec<RawMessage>),
    Fail,
}

enum MediaScript {
    Payload(MediaPayload),
    Fail,
}

#[derive(Default)]
pub struct FakeClient {
    chats: Vec<Chat>,
    list_fails: bool,
    pages: Mutex<HashMap<String, VecDeque<PageScript>>>,
    queries: Mutex<Vec<(String, FetchQuery)>>,
    fetch_delay: Option<Duration>,
    media: HashMap<String, MediaScript>,
    counts: Mutex<VecDeque<Option<usize>>>,
    last_count: Mutex<usize>,
    scroll_fails: bool,
    scrolls: AtomicUsize,
    events: Vec<ClientEvent>,
    event_tx: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    logouts: AtomicUsize,
    destroys: AtomicUsize,
    failing_teardown: HashSet<&'static str>,
    hanging_teardown: bool,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chats(mut self, chats: Vec<Chat>) -> Self {
        self.chats = chats;
        self
    }

    pub const fn with_failing_chat_list(mut self) -> Self {
        self.list_fails = true;
        self
    }

    /// Pages served to successive fetches of `chat_id`, then empty pages.
    pub fn with_pages(self, chat_id: &str, pages: Vec<Vec<RawMessage>>) -> Self {
        self.pages
            .lock()
            .unwrap()
            .entry(chat_id.to_string())
            .or_default()
            .extend(pages.into_iter().map(PageScript::Page));
        self
    }

    /// Make the next unscripted fetch of `chat_id` fail.
    pub fn with_fetch_failure(self, chat_id: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .entry(chat_id.to_string())
            .or_default()
            .push_back(PageScript::Fail);
        self
    }

    pub const fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn with_media(self, message_id: &str, mimetype: &str, bytes: &[u8]) -> Self {
        let data = STANDARD.encode(bytes);
        self.with_raw_media(message_id, mimetype, &data)
    }

    pub fn with_raw_media(mut self, message_id: &str, mimetype: &str, data: &str) -> Self {
        self.media.insert(
            message_id.to_string(),
            MediaScript::Payload(MediaPayload {
                mimetype: Some(mimetype.to_string()),
                data: data.to_string(),
            }),
        );
        self
    }

    pub fn with_failing_media(mut self, message_id: &str) -> Self {
        self.media
            .insert(message_id.to_string(), MediaScript::Fail);
        self
    }

    /// Chat counts reported by successive polls; `None` is a read error.
    /// The last successful value repeats once the script runs out.
    pub fn with_counts(self, counts: Vec<Option<usize>>) -> Self {
        *self.counts.lock().unwrap() = counts.into();
        self
    }

    pub const fn with_failing_scroll(mut self) -> Self {
        self.scroll_fails = true;
        self
    }

    /// Events delivered right after `initialize`. The stream stays open.
    pub fn with_events(mut self, events: Vec<ClientEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_failing_teardown(mut self) -> Self {
        self.failing_teardown = HashSet::from(["logout", "destroy"]);
        self
    }

    /// Make logout and destroy never complete.
    pub const fn with_hanging_teardown(mut self) -> Self {
        self.hanging_teardown = true;
        self
    }

    /// Push an event into an initialized client's stream.
    pub async fn emit(&self, event: ClientEvent) {
        let tx = self.event_tx.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    pub fn queries(&self, chat_id: &str) -> Vec<FetchQuery> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == chat_id)
            .map(|(_, q)| q.clone())
            .collect()
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingClient for FakeClient {
    async fn initialize(&self) -> Result<mpsc::Receiver<ClientEvent>> {
        let (tx, rx) = mpsc::channel(self.events.len().max(1) + 8);
        for event in &self.events {
            tx.try_send(event.clone())
                .map_err(|e| AppError::client(e.to_string()))?;
        }
        *self.event_tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn get_chats(&self) -> Result<Vec<Chat>> {
        if self.list_fails {
            return Err(AppError::client("chat list unavailable"));
        }
        Ok(self.chats.clone())
    }

    async fn fetch_messages(&self, chat_id: &str, query: FetchQuery) -> Result<Vec<RawMessage>> {
        self.queries
            .lock()
            .unwrap()
            .push((chat_id.to_string(), query));

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .pages
            .lock()
            .unwrap()
            .get_mut(chat_id)
            .and_then(VecDeque::pop_front);

        match next {
            Some(PageScript::Page(messages)) => Ok(messages),
            Some(PageScript::Fail) => Err(AppError::client(format!("fetch failed for {chat_id}"))),
            None => Ok(Vec::new()),
        }
    }

    async fn download_media(
        &self,
        _chat_id: &str,
        message: &RawMessage,
    ) -> Result<Option<MediaPayload>> {
        match message.id().and_then(|id| self.media.get(id)) {
            Some(MediaScript::Payload(payload)) => Ok(Some(payload.clone())),
            Some(MediaScript::Fail) => Err(AppError::client("download failed")),
            None => Ok(None),
        }
    }

    async fn force_load_chat_list(&self) -> Result<()> {
        self.scrolls.fetch_add(1, Ordering::SeqCst);
        if self.scroll_fails {
            return Err(AppError::client("chat list grid not found"));
        }
        Ok(())
    }

    async fn loaded_chat_count(&self) -> Result<usize> {
        let next = self.counts.lock().unwrap().pop_front();
        let mut last = self.last_count.lock().unwrap();
        match next {
            Some(Some(count)) => {
                *last = count;
                Ok(count)
            }
            Some(None) => Err(AppError::client("store not ready")),
            None => Ok(*last),
        }
    }

    async fn logout(&self) -> Result<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        if self.hanging_teardown {
            std::future::pending::<()>().await;
        }
        if self.failing_teardown.contains("logout") {
            return Err(AppError::client("already logged out"));
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        if self.hanging_teardown {
            std::future::pending::<()>().await;
        }
        if self.failing_teardown.contains("destroy") {
            return Err(AppError::client("browser already gone"));
        }
        Ok(())
    }
}

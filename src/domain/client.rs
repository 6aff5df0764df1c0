//! Contract required of the messaging client.
//!
//! The client owns authentication, the browser session and the wire
//! protocol. The exporter only talks to it through this trait, so tests can
//! swap in a scripted implementation.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::Result;
use super::models::{Chat, ClientEvent, FetchQuery, MediaPayload, RawMessage};

#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Start the client and return its lifecycle event stream.
    async fn initialize(&self) -> Result<mpsc::Receiver<ClientEvent>>;

    /// List every chat currently known to the client.
    async fn get_chats(&self) -> Result<Vec<Chat>>;

    /// Fetch one page of a chat's messages, newest first.
    async fn fetch_messages(&self, chat_id: &str, query: FetchQuery) -> Result<Vec<RawMessage>>;

    /// Download a message's attachment. `Ok(None)` means there is none.
    async fn download_media(
        &self,
        chat_id: &str,
        message: &RawMessage,
    ) -> Result<Option<MediaPayload>>;

    /// Scroll the chat list so lazily loaded chats get materialized.
    async fn force_load_chat_list(&self) -> Result<()>;

    /// Number of chat objects the client has loaded so far.
    async fn loaded_chat_count(&self) -> Result<usize>;

    async fn logout(&self) -> Result<()>;

    async fn destroy(&self) -> Result<()>;
}

//! HTTP adapter for the local automation bridge.
//!
//! The bridge is the process that owns the authenticated browser session.
//! It exposes the client operations as JSON endpoints; lifecycle events are
//! derived from polling `GET /status`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::domain::{
    AppError, BridgeConfig, Chat, ClientEvent, FetchQuery, MediaPayload, MessagingClient,
    RawMessage, Result,
};

const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Per-request limit. Generous enough for large media payloads.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const EVENT_BUFFER: usize = 16;

/// State reported by `GET /status`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BridgeStatus {
    pub state: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl BridgeStatus {
    /// Lifecycle event announced by entering this state, if any.
    #[must_use]
    pub fn event(&self) -> Option<ClientEvent> {
        match self.state.as_str() {
            "qr" => Some(ClientEvent::Qr),
            "ready" => Some(ClientEvent::Ready),
            "disconnected" => Some(ClientEvent::Disconnected(self.detail.clone())),
            "auth_failure" => Some(ClientEvent::AuthFailure(self.detail.clone())),
            "closed" => Some(ClientEvent::WindowClosed),
            _ => None,
        }
    }

    /// Whether no further events can follow this state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state.as_str(),
            "disconnected" | "auth_failure" | "closed"
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatCount {
    count: usize,
}

/// `MessagingClient` backed by the bridge's HTTP API.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    http: Client,
    base: Url,
}

impl BridgeClient {
    /// Create a client for the bridge at `config.base_url`.
    ///
    /// # Errors
    /// Returns error if the base URL is not a valid http(s) URL.
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| AppError::Config {
            message: format!("Invalid bridge URL '{}': {e}", config.base_url),
        })?;
        if base.cannot_be_a_base() {
            return Err(AppError::Config {
                message: format!("Bridge URL cannot be used as a base: {base}"),
            });
        }

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(AppError::transport)?;

        Ok(Self { http, base })
    }

    /// Build an endpoint URL, percent-encoding every segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::client(format!("Bridge URL cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(AppError::transport)?
            .error_for_status()
            .map_err(AppError::transport)?;

        response.json().await.map_err(AppError::transport)
    }

    async fn post(&self, segments: &[&str]) -> Result<()> {
        self.http
            .post(self.endpoint(segments)?)
            .send()
            .await
            .map_err(AppError::transport)?
            .error_for_status()
            .map_err(AppError::transport)?;
        Ok(())
    }
}

#[async_trait]
impl MessagingClient for BridgeClient {
    async fn initialize(&self) -> Result<mpsc::Receiver<ClientEvent>> {
        self.post(&["initialize"]).await?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let http = self.http.clone();
        let status_url = self.endpoint(&["status"])?;

        tokio::spawn(async move {
            let mut last_state: Option<String> = None;
            let mut ticker = tokio::time::interval(STATUS_POLL_INTERVAL);
            loop {
                ticker.tick().await;
                let status = match fetch_status(&http, status_url.clone()).await {
                    Ok(status) => status,
                    Err(e) => {
                        tracing::debug!(error = %e, "Status poll failed");
                        continue;
                    }
                };
                if last_state.as_deref() == Some(status.state.as_str()) {
                    continue;
                }
                tracing::debug!(state = %status.state, "Bridge state changed");
                last_state = Some(status.state.clone());

                if let Some(event) = status.event() {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                if status.is_terminal() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn get_chats(&self) -> Result<Vec<Chat>> {
        self.get_json(self.endpoint(&["chats"])?).await
    }

    async fn fetch_messages(&self, chat_id: &str, query: FetchQuery) -> Result<Vec<RawMessage>> {
        let mut url = self.endpoint(&["chats", chat_id, "messages"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &query.limit.to_string());
            if let Some(before) = &query.before {
                pairs.append_pair("before", before);
            }
        }
        self.get_json(url).await
    }

    async fn download_media(
        &self,
        chat_id: &str,
        message: &RawMessage,
    ) -> Result<Option<MediaPayload>> {
        let message_id = message
            .id()
            .ok_or_else(|| AppError::client("Message has no id"))?;
        let url = self.endpoint(&["chats", chat_id, "messages", message_id, "media"])?;

        let response = self.http.get(url).send().await.map_err(AppError::transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().map_err(AppError::transport)?;
        response.json().await.map_err(AppError::transport)
    }

    async fn force_load_chat_list(&self) -> Result<()> {
        self.post(&["ui", "scroll-chat-list"]).await
    }

    async fn loaded_chat_count(&self) -> Result<usize> {
        let count: ChatCount = self.get_json(self.endpoint(&["store", "chat-count"])?).await?;
        Ok(count.count)
    }

    async fn logout(&self) -> Result<()> {
        self.post(&["logout"]).await
    }

    async fn destroy(&self) -> Result<()> {
        self.post(&["destroy"]).await
    }
}

async fn fetch_status(http: &Client, url: Url) -> Result<BridgeStatus> {
    http.get(url)
        .send()
        .await
        .map_err(AppError::transport)?
        .error_for_status()
        .map_err(AppError::transport)?
        .json()
        .await
        .map_err(AppError::transport)
}

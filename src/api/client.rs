use crate::api::models::{
    AddToQueueRequest, ErrorEnvelope, MoveQueueItemRequest, PlaylistDetail, QueuePosition,
    QueueState,
};
use crate::config::ApiConfig;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, Error as ReqwestError, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),
    #[error("{message} ({code}, HTTP {status})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    /// Machine-readable code, when the server provided one
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Api { status: 404, .. })
    }
}

/// Remote queue operations used by the dispatch paths (allows mocking for tests)
#[async_trait::async_trait]
pub trait QueueBackend: Send + Sync {
    async fn add_to_queue(&self, video_id: &str, position: QueuePosition) -> Result<(), ApiError>;
    async fn clear_queue(&self) -> Result<(), ApiError>;
}

/// Playlist lookups used by the resolver and the send path
#[async_trait::async_trait]
pub trait PlaylistFetcher: Send + Sync {
    async fn get_playlist(&self, playlist_id: &str) -> Result<PlaylistDetail, ApiError>;
}

/// Client for the playlist/queue REST API
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ApiError::InvalidInput(format!("session cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let mut builder = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .user_agent("kryten/0.1");

        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Fetch a playlist with its ordered items
    pub async fn get_playlist(&self, playlist_id: &str) -> Result<PlaylistDetail, ApiError> {
        if playlist_id.is_empty() {
            return Err(ApiError::InvalidInput("playlist id is empty".to_string()));
        }
        let request = self
            .client
            .get(self.url(&format!("/playlists/{}", playlist_id)));
        let response = execute(request).await?;
        read_json(response).await
    }

    /// Add one catalog video to the shared queue
    pub async fn add_to_queue(
        &self,
        video_id: &str,
        position: QueuePosition,
    ) -> Result<(), ApiError> {
        let request = self
            .client
            .post(self.url("/queue/add"))
            .json(&AddToQueueRequest { video_id, position });
        execute(request).await?;
        Ok(())
    }

    /// Remove every item from the shared queue
    pub async fn clear_queue(&self) -> Result<(), ApiError> {
        execute(self.client.delete(self.url("/queue/clear"))).await?;
        Ok(())
    }

    pub async fn get_queue(&self) -> Result<QueueState, ApiError> {
        let response = execute(self.client.get(self.url("/queue"))).await?;
        read_json(response).await
    }

    /// Move a queue entry after another one (`None` moves it to the front)
    pub async fn move_queue_item(&self, uid: &str, after_uid: Option<&str>) -> Result<(), ApiError> {
        let request = self
            .client
            .post(self.url("/queue/move"))
            .json(&MoveQueueItemRequest { uid, after_uid });
        execute(request).await?;
        Ok(())
    }

    pub async fn remove_queue_item(&self, uid: &str) -> Result<(), ApiError> {
        if uid.is_empty() {
            return Err(ApiError::InvalidInput("queue uid is empty".to_string()));
        }
        execute(self.client.delete(self.url(&format!("/queue/{}", uid)))).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl QueueBackend for ApiClient {
    async fn add_to_queue(&self, video_id: &str, position: QueuePosition) -> Result<(), ApiError> {
        ApiClient::add_to_queue(self, video_id, position).await
    }

    async fn clear_queue(&self) -> Result<(), ApiError> {
        ApiClient::clear_queue(self).await
    }
}

#[async_trait::async_trait]
impl PlaylistFetcher for ApiClient {
    async fn get_playlist(&self, playlist_id: &str) -> Result<PlaylistDetail, ApiError> {
        ApiClient::get_playlist(self, playlist_id).await
    }
}

async fn execute(request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request.send().await?;
    let status = response.status();
    debug!("{} {}", status, response.url());

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let error = error_from_body(status.as_u16(), &body);
    warn!("✗ API error: {}", error);
    Err(error)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Build a structured error from a non-2xx body shaped like `{"error": {"code", "message"}}`
pub(crate) fn error_from_body(status: u16, body: &str) -> ApiError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let error = envelope.error.unwrap_or_default();

    ApiError::Api {
        status,
        code: error.code.unwrap_or_else(|| "UNKNOWN_ERROR".to_string()),
        message: error
            .message
            .unwrap_or_else(|| format!("Request failed with status {}", status)),
    }
}

//! HTTP client for the Brewdoro task/session API.
//!
//! This module talks to the remote API that owns sessions and tasks:
//!
//! - Connection pooling and request timeouts via reqwest
//! - Non-2xx responses surfaced as [`ApiError::Http`] with the response body
//! - Connection and timeout failures surfaced as [`ApiError::Network`]
//!
//! Nothing is retried here. A failed call is reported to the caller, which
//! decides whether the user should retry the action.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use brewdoro_client::api::{ApiClient, SessionApi};
//! use brewdoro_client::types::NewSession;
//!
//! #[tokio::main]
//! async fn main() {
//!     let api = ApiClient::new("http://localhost:8080/api/v1", Duration::from_secs(30)).unwrap();
//!
//!     let session = api
//!         .create_session(&NewSession {
//!             user_id: "123".to_string(),
//!             task_id: "42".to_string(),
//!             focus_minutes: 25,
//!             break_minutes: 5,
//!         })
//!         .await
//!         .unwrap();
//!
//!     println!("session {} started", session.id);
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{FinishOutcome, NewSession, NewTask, Session, Task, TaskUpdate};

/// Maximum idle connections kept per host.
const POOL_MAX_IDLE_PER_HOST: usize = 4;

/// Errors that can occur while calling the remote API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, transport).
    #[error("network failure: {0}")]
    Network(#[source] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("server returned {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body was not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(#[source] reqwest::Error),

    /// The configured base URL cannot carry path segments.
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Returns the HTTP status for [`ApiError::Http`].
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Remote operations the session controller depends on.
///
/// [`ApiClient`] is the HTTP implementation; tests substitute scripted fakes.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// `POST /sessions`
    async fn create_session(&self, body: &NewSession) -> Result<Session, ApiError>;

    /// `PATCH /sessions/{id}/pause`
    async fn pause_session(&self, session_id: &str) -> Result<Session, ApiError>;

    /// `PATCH /sessions/{id}/resume`
    async fn resume_session(&self, session_id: &str) -> Result<Session, ApiError>;

    /// `PATCH /sessions/{id}/finish`
    async fn finish_session(&self, session_id: &str) -> Result<FinishOutcome, ApiError>;

    /// `GET /tasks/user/{userId}`
    async fn tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>, ApiError>;

    /// `PATCH /tasks/{id}/complete`
    async fn complete_task(&self, task_id: &str) -> Result<Task, ApiError>;
}

/// HTTP client for the task/session API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    client: Client,
}

impl ApiClient {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if `base_url` is not an absolute
    /// http(s) URL, or [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self { base_url, client })
    }

    /// Returns the base URL requests are built from.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `POST /tasks`
    pub async fn create_task(&self, body: &NewTask) -> Result<Task, ApiError> {
        let request = self.request(Method::POST, &["tasks"])?.json(body);
        decode(self.send(request).await?).await
    }

    /// `PUT /tasks/{id}`
    pub async fn update_task(&self, task_id: &str, body: &TaskUpdate) -> Result<Task, ApiError> {
        let request = self.request(Method::PUT, &["tasks", task_id])?.json(body);
        decode(self.send(request).await?).await
    }

    /// `DELETE /tasks/{id}`
    ///
    /// The response body is ignored.
    pub async fn delete_task(&self, task_id: &str) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, &["tasks", task_id])?;
        self.send(request).await?;
        Ok(())
    }

    /// Builds a request for `base_url` joined with the given path segments.
    ///
    /// Segments are percent-encoded, so identifiers cannot escape their slot.
    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(self.client.request(method, url))
    }

    /// Sends a request and maps transport failures and non-2xx statuses.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = request.build().map_err(ApiError::Network)?;
        let method = request.method().clone();
        let url = request.url().clone();

        debug!(method = %method, url = %url, "Sending API request");

        let response = self.client.execute(request).await.map_err(|e| {
            warn!(method = %method, url = %url, error = %e, "API request failed");
            ApiError::Network(e)
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(method = %method, url = %url, status = status.as_u16(), "API request succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("unknown status").to_string()
        } else {
            body
        };
        warn!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            message = %message,
            "API returned error status"
        );
        Err(ApiError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response.json::<T>().await.map_err(ApiError::Decode)
}

#[async_trait]
impl SessionApi for ApiClient {
    async fn create_session(&self, body: &NewSession) -> Result<Session, ApiError> {
        let request = self.request(Method::POST, &["sessions"])?.json(body);
        decode(self.send(request).await?).await
    }

    async fn pause_session(&self, session_id: &str) -> Result<Session, ApiError> {
        let request = self.request(Method::PATCH, &["sessions", session_id, "pause"])?;
        decode(self.send(request).await?).await
    }

    async fn resume_session(&self, session_id: &str) -> Result<Session, ApiError> {
        let request = self.request(Method::PATCH, &["sessions", session_id, "resume"])?;
        decode(self.send(request).await?).await
    }

    async fn finish_session(&self, session_id: &str) -> Result<FinishOutcome, ApiError> {
        let request = self.request(Method::PATCH, &["sessions", session_id, "finish"])?;
        decode(self.send(request).await?).await
    }

    async fn tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>, ApiError> {
        let request = self.request(Method::GET, &["tasks", "user", user_id])?;
        decode(self.send(request).await?).await
    }

    async fn complete_task(&self, task_id: &str) -> Result<Task, ApiError> {
        let request = self.request(Method::PATCH, &["tasks", task_id, "complete"])?;
        decode(self.send(request).await?).await
    }
}

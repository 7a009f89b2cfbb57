//! HTTP client for the synced-mode server.
//!
//! [`HttpStore`] implements the store interfaces against the server's REST
//! routes so a [`crate::tasks::SyncCoordinator`] can run unchanged on a
//! client machine. The owner identity travels in the `X-Owner-Id` header.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use focus_proto::session::{FocusSession, NewSession};
use focus_proto::settings::{SettingsPatch, UserSettings};
use focus_proto::task::{OwnerId, Task, TaskId, TaskPatch};

use crate::stats::DerivedStats;
use crate::store::{SessionLog, SettingsStore, StoreError, TaskStore};

/// Header carrying the caller's owner id.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Body of an error response.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Response of the health route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// REST client for one server.
pub struct HttpStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpStore {
    /// Builds a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the HTTP client cannot be
    /// constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The server base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks that the server answers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the server cannot be reached.
    pub async fn health(&self) -> Result<Health, StoreError> {
        let response = self
            .http
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
            .map_err(unreachable)?;
        parse(response).await
    }

    /// Fetches derived stats computed by the server.
    ///
    /// `offset_minutes` is the caller's UTC offset, so day boundaries follow
    /// the caller's local calendar rather than the server's. The server
    /// applies that one offset to every session, so across a DST change a
    /// session within an hour of midnight can land on a neighbouring day.
    /// [`crate::stats::compute_local`] over [`SessionLog::list_sessions`]
    /// avoids this at the cost of the server's list cap.
    ///
    /// # Errors
    ///
    /// Any [`StoreError`] reported by the server or transport.
    pub async fn stats(
        &self,
        owner: &OwnerId,
        offset_minutes: i32,
    ) -> Result<DerivedStats, StoreError> {
        let response = self
            .request(reqwest::Method::GET, "/api/v1/sessions/stats", owner)?
            .query(&[("offsetMinutes", offset_minutes)])
            .send()
            .await
            .map_err(unreachable)?;
        parse(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// URL of one task, with the id percent-encoded as a single segment.
    fn task_url(&self, id: &TaskId) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.url("/api/v1/tasks"))
            .map_err(|e| StoreError::Invalid(format!("invalid server url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| StoreError::Invalid("server url cannot have a path".to_string()))?
            .push(id.as_str());
        Ok(url)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        owner: &OwnerId,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        self.request_to(method, self.url(path), owner)
    }

    fn request_to(
        &self,
        method: reqwest::Method,
        url: impl reqwest::IntoUrl,
        owner: &OwnerId,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        let identity = HeaderValue::from_str(owner.as_str())
            .map_err(|e| StoreError::Invalid(format!("owner id is not a valid header: {e}")))?;
        Ok(self.http.request(method, url).header(OWNER_HEADER, identity))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, StoreError> {
        let response = builder.send().await.map_err(unreachable)?;
        parse(response).await
    }
}

fn unreachable(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Unavailable(format!("request timed out: {err}"))
    } else {
        StoreError::Unavailable(format!("HTTP request failed: {err}"))
    }
}

/// Turns a response into a value or a [`StoreError`] by status code.
async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to parse response: {e}")));
    }
    Err(status_error(status, response).await)
}

async fn expect_empty(response: Response) -> Result<(), StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(status_error(status, response).await)
}

async fn status_error(status: StatusCode, response: Response) -> StoreError {
    let reason = response
        .json::<ErrorBody>()
        .await
        .map_or_else(|_| status.to_string(), |body| body.error);
    tracing::debug!(status = %status, reason = %reason, "server rejected request");
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => StoreError::Invalid(reason),
        StatusCode::NOT_FOUND => StoreError::NotFound(reason),
        StatusCode::UNAUTHORIZED => StoreError::Unauthenticated,
        _ => StoreError::Unavailable(format!("API error ({status}): {reason}")),
    }
}

impl TaskStore for HttpStore {
    async fn create(&self, owner: &OwnerId, text: &str) -> Result<Task, StoreError> {
        let body = serde_json::json!({ "text": text });
        let builder = self
            .request(reqwest::Method::POST, "/api/v1/tasks", owner)?
            .json(&body);
        self.send(builder).await
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Task>, StoreError> {
        let builder = self.request(reqwest::Method::GET, "/api/v1/tasks", owner)?;
        self.send(builder).await
    }

    async fn update_partial(
        &self,
        owner: &OwnerId,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> Result<Task, StoreError> {
        let builder = self
            .request_to(reqwest::Method::PATCH, self.task_url(id)?, owner)?
            .json(patch);
        self.send(builder).await
    }

    async fn delete(&self, owner: &OwnerId, id: &TaskId) -> Result<(), StoreError> {
        let response = self
            .request_to(reqwest::Method::DELETE, self.task_url(id)?, owner)?
            .send()
            .await
            .map_err(unreachable)?;
        expect_empty(response).await
    }
}

impl SessionLog for HttpStore {
    async fn append(
        &self,
        owner: &OwnerId,
        task: Option<&str>,
        minutes: u32,
    ) -> Result<FocusSession, StoreError> {
        let body = NewSession {
            task: task.map(str::to_string),
            minutes,
        };
        let builder = self
            .request(reqwest::Method::POST, "/api/v1/sessions", owner)?
            .json(&body);
        self.send(builder).await
    }

    /// Returns the sessions the server lists, newest first and capped by
    /// the server's list limit.
    async fn list_sessions(&self, owner: &OwnerId) -> Result<Vec<FocusSession>, StoreError> {
        let builder = self.request(reqwest::Method::GET, "/api/v1/sessions", owner)?;
        self.send(builder).await
    }
}

impl SettingsStore for HttpStore {
    async fn get_settings(&self, owner: &OwnerId) -> Result<UserSettings, StoreError> {
        let builder = self.request(reqwest::Method::GET, "/api/v1/settings", owner)?;
        self.send(builder).await
    }

    async fn update_settings(
        &self,
        owner: &OwnerId,
        patch: &SettingsPatch,
    ) -> Result<UserSettings, StoreError> {
        let builder = self
            .request(reqwest::Method::PUT, "/api/v1/settings", owner)?
            .json(patch);
        self.send(builder).await
    }
}

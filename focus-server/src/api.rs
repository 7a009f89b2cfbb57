//! REST surface: tasks, sessions, stats, and settings.
//!
//! Every `/api/v1` route is scoped to the owner named by the
//! [`OWNER_HEADER`] header. Committed task changes and new sessions are
//! pushed to the owner's event-channel connections after the store accepts
//! them.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use focus::FocusError;
use focus::remote::OWNER_HEADER;
use focus::stats::{self, DerivedStats};
use focus::store::{SessionLog, SettingsStore, StoreError, TaskStore};
use focus_proto::channel::ChannelMessage;
use focus_proto::session::{FocusSession, NewSession, sort_sessions_newest_first};
use focus_proto::settings::{SettingsPatch, UserSettings};
use focus_proto::task::{OwnerId, SyncEvent, Task, TaskId, TaskPatch};

use crate::state::AppState;

/// Builds the REST routes over shared state.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/v1/tasks", get(list_tasks).post(create_task))
        .route("/api/v1/tasks/{id}", patch(update_task).delete(delete_task))
        .route("/api/v1/sessions", get(list_sessions).post(create_session))
        .route("/api/v1/sessions/stats", get(session_stats))
        .route("/api/v1/settings", get(get_settings).put(put_settings))
}

/// A request failure rendered as `{"error": reason}` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub FocusError);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl From<FocusError> for ApiError {
    fn from(err: FocusError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FocusError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FocusError::NotFound(_) => StatusCode::NOT_FOUND,
            FocusError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            FocusError::Unauthenticated => StatusCode::UNAUTHORIZED,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let error = match self.0 {
            FocusError::InvalidInput(reason)
            | FocusError::NotFound(reason)
            | FocusError::StoreUnavailable(reason) => reason,
            FocusError::Unauthenticated => "owner identity is required".to_string(),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

/// The caller's owner id, taken from the [`OWNER_HEADER`] header.
///
/// Missing or blank ids are rejected with 401 before the handler runs.
pub struct Owner(pub OwnerId);

impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Self(OwnerId::new(value)))
            .ok_or(ApiError(FocusError::Unauthenticated))
    }
}

/// A JSON request body. Bodies that are not valid JSON for `T` (a negative
/// minute count, say) are rejected as [`FocusError::InvalidInput`].
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(FocusError::InvalidInput(rejection.body_text()).into()),
        }
    }
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
    timestamp: String,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Deserialize)]
struct CreateTask {
    text: String,
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.store.list_by_owner(&owner).await?))
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    JsonBody(body): JsonBody<CreateTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    check_length(&state, &body.text)?;
    let task = state.store.create(&owner, &body.text).await?;
    tracing::info!(owner = %owner, id = %task.id, "task created");
    state.publish_event(&owner, SyncEvent::Created(task.clone()));
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    if patch.is_empty() {
        return Err(FocusError::InvalidInput("nothing to update".to_string()).into());
    }
    if let Some(text) = &patch.text {
        check_length(&state, text)?;
    }
    let task = state
        .store
        .update_partial(&owner, &TaskId::from_string(id), &patch)
        .await?;
    tracing::info!(owner = %owner, id = %task.id, "task updated");
    state.publish_event(&owner, SyncEvent::Updated(task.clone()));
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = TaskId::from_string(id);
    state.store.delete(&owner, &id).await?;
    tracing::info!(owner = %owner, id = %id, "task deleted");
    state.publish_event(&owner, SyncEvent::Deleted { id });
    Ok(StatusCode::NO_CONTENT)
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<Vec<FocusSession>>, ApiError> {
    let mut sessions = state.store.list_sessions(&owner).await?;
    sort_sessions_newest_first(&mut sessions);
    sessions.truncate(state.session_list_limit());
    Ok(Json(sessions))
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    JsonBody(body): JsonBody<NewSession>,
) -> Result<(StatusCode, Json<FocusSession>), ApiError> {
    let session = state
        .store
        .append(&owner, body.task.as_deref(), body.minutes)
        .await?;
    tracing::info!(owner = %owner, minutes = session.minutes, "session recorded");
    state
        .hub
        .publish(&owner, &ChannelMessage::SessionCreated(session.clone()), None);
    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsQuery {
    /// Caller's UTC offset; the server's own zone when absent.
    offset_minutes: Option<i32>,
}

async fn session_stats(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Query(query): Query<StatsQuery>,
) -> Result<Json<DerivedStats>, ApiError> {
    let sessions = state.store.list_sessions(&owner).await?;
    let now = Utc::now();
    let derived = match query.offset_minutes {
        Some(minutes) => {
            let offset = minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .ok_or_else(|| {
                    FocusError::InvalidInput(format!("offset out of range: {minutes} minutes"))
                })?;
            stats::compute(&sessions, &now.with_timezone(&offset))
        }
        None => stats::compute_local(&sessions, now),
    };
    Ok(Json(derived))
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<UserSettings>, ApiError> {
    Ok(Json(state.store.get_settings(&owner).await?))
}

async fn put_settings(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    JsonBody(patch): JsonBody<SettingsPatch>,
) -> Result<Json<UserSettings>, ApiError> {
    let settings = state.store.update_settings(&owner, &patch).await?;
    tracing::info!(owner = %owner, "settings updated");
    Ok(Json(settings))
}

fn check_length(state: &AppState, text: &str) -> Result<(), ApiError> {
    let len = text.trim().chars().count();
    if len > state.max_text_length() {
        return Err(FocusError::InvalidInput(format!(
            "task text too long: {len} characters, max {}",
            state.max_text_length()
        ))
        .into());
    }
    Ok(())
}

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use ui_callback::{CoordinatorSnapshot, PollOutcome, RequestScope, SessionContext, SessionRegistry};
use ui_callback_error::CallbackError;

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_id: String,
    push_active: bool,
    has_pending_work: bool,
    blocked_requests: usize,
}

impl SessionResponse {
    fn from_context(context: &SessionContext) -> Self {
        let callbacks = context.callbacks();
        Self {
            session_id: context.id().to_string(),
            push_active: callbacks.is_push_active(),
            has_pending_work: callbacks.has_pending_work(),
            blocked_requests: callbacks.blocked_requests(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ActivationResponse {
    active: usize,
}

#[derive(Debug, Deserialize)]
struct WorkRequest {
    pending: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkResponse {
    needs_activation: bool,
}

#[derive(Debug, Serialize)]
struct CallbackResponse {
    released: bool,
    outcome: PollOutcome,
}

pub fn build_router(sessions: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/v1/health", get(get_health))
        .route(
            "/v1/sessions/:session_id",
            get(get_session).post(post_session).delete(delete_session),
        )
        .route(
            "/v1/sessions/:session_id/activations/:feature_id",
            put(put_activation).delete(delete_activation),
        )
        .route("/v1/sessions/:session_id/work", post(post_work))
        .route("/v1/sessions/:session_id/wake", post(post_wake))
        .route("/v1/sessions/:session_id/callback", get(get_callback))
        .route(
            "/v1/sessions/:session_id/snapshot",
            get(get_snapshot).put(put_snapshot),
        )
        .with_state(sessions)
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn get_session(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let context = lookup(&sessions, &session_id)?;
    Ok(Json(SessionResponse::from_context(&context)))
}

async fn post_session(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let context = sessions
        .create(&session_id)
        .ok_or_else(|| CallbackError::SessionAlreadyExists {
            session_id: session_id.clone(),
        })?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from_context(&context))))
}

async fn delete_session(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if sessions.destroy(&session_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CallbackError::SessionNotFound { session_id }.into())
    }
}

async fn put_activation(
    State(sessions): State<Arc<SessionRegistry>>,
    Path((session_id, feature_id)): Path<(String, String)>,
) -> Result<Json<ActivationResponse>, ApiError> {
    let context = lookup(&sessions, &session_id)?;
    let active = context.callbacks().activate(feature_id);
    Ok(Json(ActivationResponse { active }))
}

async fn delete_activation(
    State(sessions): State<Arc<SessionRegistry>>,
    Path((session_id, feature_id)): Path<(String, String)>,
) -> Result<Json<ActivationResponse>, ApiError> {
    let context = lookup(&sessions, &session_id)?;
    let active = context.callbacks().deactivate(&feature_id);
    Ok(Json(ActivationResponse { active }))
}

/// Runs one worker pass that reports whether it left work for the client.
async fn post_work(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
    payload: Result<Json<WorkRequest>, JsonRejection>,
) -> Result<Json<WorkResponse>, ApiError> {
    let Json(request) = payload.map_err(map_rejection)?;
    let context = lookup(&sessions, &session_id)?;
    let callbacks = context.callbacks();
    let scope = RequestScope::new();

    callbacks.notify_worker_start();
    callbacks.set_has_pending_work(request.pending, &scope);
    callbacks.notify_worker_end();

    Ok(Json(WorkResponse {
        needs_activation: callbacks.needs_activation(&scope),
    }))
}

async fn post_wake(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let context = lookup(&sessions, &session_id)?;
    context.callbacks().request_wake();
    Ok(StatusCode::ACCEPTED)
}

async fn get_callback(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<Json<CallbackResponse>, ApiError> {
    let context = lookup(&sessions, &session_id)?;
    let callbacks = context.callbacks().clone();

    // hyper drops this future when the client disconnects, which unregisters
    // the poll; the write-side probe has nothing to add here.
    let probe = || true;
    let outcome = callbacks.process_request_detailed(&probe).await;
    tracing::debug!(session_id = %session_id, outcome = %outcome, "callback poll answered");

    Ok(Json(CallbackResponse {
        released: outcome.is_released(),
        outcome,
    }))
}

async fn get_snapshot(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<Json<CoordinatorSnapshot>, ApiError> {
    let context = lookup(&sessions, &session_id)?;
    Ok(Json(context.callbacks().snapshot()))
}

async fn put_snapshot(
    State(sessions): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
    body: String,
) -> Result<Json<SessionResponse>, ApiError> {
    let snapshot =
        CoordinatorSnapshot::from_json(&body).map_err(|err| CallbackError::InvalidSnapshot {
            message: err.to_string(),
        })?;
    let context = sessions.restore(&session_id, snapshot);
    Ok(Json(SessionResponse::from_context(&context)))
}

fn lookup(sessions: &SessionRegistry, session_id: &str) -> Result<SessionContext, CallbackError> {
    sessions
        .get(session_id)
        .ok_or_else(|| CallbackError::SessionNotFound {
            session_id: session_id.to_string(),
        })
}

fn map_rejection(rejection: JsonRejection) -> CallbackError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => CallbackError::UnsupportedMediaType {
            message: "content-type must be application/json".to_string(),
        },
        other => CallbackError::InvalidRequest {
            message: other.body_text(),
        },
    }
}

#[derive(Debug)]
pub struct ApiError(CallbackError);

impl From<CallbackError> for ApiError {
    fn from(value: CallbackError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let problem = self.0.to_problem_details();
        let status =
            StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        tracing::debug!(status = status.as_u16(), error = %self.0, "request failed");
        (status, Json(problem)).into_response()
    }
}

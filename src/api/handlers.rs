//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ChoiceRequest, CreateSessionRequest, ErrorResponse, LocaleRequest, LocaleResponse,
    LocalesResponse, SessionResponse, StatusResponse, SuccessResponse,
};
use super::AppState;
use crate::locale::Locale;
use crate::runtime::{DialogueSnapshot, SessionError, SessionEvent};
use crate::state_machine::TransitionError;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/end", post(end_session))
        // Live updates
        .route("/api/sessions/:id/stream", get(stream_session))
        // Visitor actions
        .route("/api/sessions/:id/choice", post(select_choice))
        .route("/api/sessions/:id/reset", post(reset_session))
        .route("/api/sessions/:id/locale", post(change_locale))
        // Service info
        .route("/api/locales", get(list_locales))
        .route("/api/status", get(get_status))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SessionResponse>, AppError> {
    let req: CreateSessionRequest = optional_json(&body)?;
    let locale = req.locale.as_deref().map(parse_locale).transpose()?;

    let handle = state.sessions.create(locale).await?;
    Ok(Json(SessionResponse {
        session_id: handle.id().to_string(),
        snapshot: handle.snapshot(),
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DialogueSnapshot>, AppError> {
    let handle = state.sessions.get(&id).await?;
    Ok(Json(handle.snapshot()))
}

async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.sessions.end(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Live Updates
// ============================================================

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.sessions.get(&id).await?;

    // Subscribe before reading the snapshot so nothing falls in between
    let broadcast_rx = handle.subscribe();
    let init_event = SessionEvent::Init {
        snapshot: handle.snapshot(),
    };

    Ok(sse_stream(init_event, broadcast_rx))
}

// ============================================================
// Visitor Actions
// ============================================================

async fn select_choice(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChoiceRequest>,
) -> Result<Json<DialogueSnapshot>, AppError> {
    let handle = state.sessions.get(&id).await?;
    let snapshot = handle.select_choice(req.index).await?;
    Ok(Json(snapshot))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DialogueSnapshot>, AppError> {
    let handle = state.sessions.get(&id).await?;
    let snapshot = handle.reset().await?;
    Ok(Json(snapshot))
}

async fn change_locale(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LocaleRequest>,
) -> Result<(StatusCode, Json<LocaleResponse>), AppError> {
    let locale = parse_locale(&req.locale)?;
    if !state.sessions.catalog().locales().contains(&locale) {
        return Err(AppError::BadRequest(format!(
            "no dialogue authored for locale '{locale}'"
        )));
    }

    let handle = state.sessions.get(&id).await?;
    let changed = handle.change_locale(locale);
    Ok((StatusCode::ACCEPTED, Json(LocaleResponse { locale, changed })))
}

// ============================================================
// Service Info
// ============================================================

async fn list_locales(State(state): State<AppState>) -> Json<LocalesResponse> {
    Json(LocalesResponse {
        locales: state.sessions.catalog().locales(),
        default: state.sessions.default_locale(),
    })
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.sessions.len().await,
    })
}

async fn get_version() -> &'static str {
    concat!("message-us ", env!("CARGO_PKG_VERSION"))
}

/// An empty body means defaults; anything else must be valid JSON for `T`
fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("invalid request body: {e}")))
}

fn parse_locale(tag: &str) -> Result<Locale, AppError> {
    tag.parse::<Locale>()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::NotFound(e.to_string()),
            SessionError::Closed => AppError::Conflict(e.to_string()),
            SessionError::Transition(TransitionError::Composing) => AppError::Conflict(e.to_string()),
            SessionError::Transition(TransitionError::InvalidChoice { .. }) => {
                AppError::BadRequest(e.to_string())
            }
            SessionError::Catalog(_) => AppError::BadRequest(e.to_string()),
            SessionError::Transition(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

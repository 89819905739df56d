use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::backend::{RefineClient, SummaryBackend};
use crate::citations::{process_markdown, CitationStyle};
use crate::config::AppConfig;
use crate::models::{ChatMessage, PaperContext};
use crate::render::{render_history, DisplayMessage};
use crate::session::{ChatSession, Mode, SubmitReport};

struct SessionEntry {
    session: ChatSession,
    created_at: DateTime<Utc>,
}

#[derive(Clone)]
struct AppState {
    config: AppConfig,
    client: RefineClient,
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
}

pub async fn run_server(config: AppConfig, client: RefineClient) -> Result<()> {
    let state = AppState {
        config: config.clone(),
        client,
        sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    let app = Router::new()
        .route("/", get(index_page))
        .route("/api/session", post(create_session))
        .route("/api/session/:session_id", get(get_session_view))
        .route("/api/session/:session_id/message", post(post_message))
        .route("/api/session/:session_id/mode", post(switch_mode))
        .route("/api/session/:session_id/reset", post(reset_session))
        .route("/api/session/:session_id/summary", get(get_summary))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let template = IndexTemplate {
        backend_url: state.config.refine_base_url.clone(),
    };
    let body = template.render().map_err(ApiError::from)?;
    Ok(Html(body))
}

#[derive(Serialize)]
struct SessionCreated {
    session_id: String,
}

async fn create_session(
    State(state): State<AppState>,
    Json(context): Json<PaperContext>,
) -> Result<Json<SessionCreated>, ApiError> {
    let session_id = Uuid::new_v4().to_string();
    let callback_id = session_id.clone();
    let session = ChatSession::new(
        context,
        Arc::new(move |summary: &str| {
            tracing::info!(session = %callback_id, chars = summary.len(), "summary updated");
        }),
    );

    let mut sessions = lock_sessions(&state)?;
    sessions.insert(
        session_id.clone(),
        SessionEntry {
            session,
            created_at: Utc::now(),
        },
    );

    Ok(Json(SessionCreated { session_id }))
}

#[derive(Serialize)]
struct SessionView {
    session_id: String,
    mode: Mode,
    summary: String,
    messages: Vec<DisplayMessage>,
    created_at: DateTime<Utc>,
}

impl SessionView {
    fn from_entry(session_id: &str, entry: &SessionEntry) -> Self {
        Self {
            session_id: session_id.to_string(),
            mode: entry.session.mode(),
            summary: entry.session.current_summary().to_string(),
            messages: render_history(entry.session.history()),
            created_at: entry.created_at,
        }
    }
}

async fn get_session_view(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let sessions = lock_sessions(&state)?;
    let entry = get_entry(&sessions, &session_id)?;
    Ok(Json(SessionView::from_entry(&session_id, entry)))
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

#[derive(Serialize)]
struct MessageResponse {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<SubmitReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
}

async fn post_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<MessageBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    // Begin under the lock, dispatch without it, complete under the lock
    // again: the session stays reachable for reset/mode calls while the
    // refinement request is in flight, and a reset in that window makes
    // the eventual completion a discard.
    let pending = {
        let mut sessions = lock_sessions(&state)?;
        let entry = get_entry_mut(&mut sessions, &session_id)?;
        entry.session.begin_submit(&body.message)
    };

    let Some(pending) = pending else {
        // Blank input, or a prior request is still outstanding.
        return Ok(Json(MessageResponse {
            accepted: false,
            report: None,
            summary: None,
        }));
    };

    let result = state.client.dispatch(&pending.request).await;

    let mut sessions = lock_sessions(&state)?;
    let entry = get_entry_mut(&mut sessions, &session_id)?;
    let report = entry.session.complete_submit(pending, result);
    let summary = report
        .summary_updated
        .then(|| entry.session.current_summary().to_string());

    Ok(Json(MessageResponse {
        accepted: true,
        report: Some(report),
        summary,
    }))
}

#[derive(Deserialize)]
struct ModeBody {
    mode: Mode,
}

#[derive(Serialize)]
struct ModeResponse {
    mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<ChatMessage>,
}

async fn switch_mode(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<ModeBody>,
) -> Result<Json<ModeResponse>, ApiError> {
    let mut sessions = lock_sessions(&state)?;
    let entry = get_entry_mut(&mut sessions, &session_id)?;
    let notice = entry.session.switch_mode(body.mode);

    Ok(Json(ModeResponse {
        mode: entry.session.mode(),
        notice,
    }))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let mut sessions = lock_sessions(&state)?;
    let entry = get_entry_mut(&mut sessions, &session_id)?;
    entry.session.reset();
    Ok(Json(SessionView::from_entry(&session_id, entry)))
}

#[derive(Deserialize)]
struct SummaryQuery {
    #[serde(default = "default_style")]
    style: CitationStyle,
    #[serde(default = "default_true")]
    has_citations: bool,
}

fn default_style() -> CitationStyle {
    CitationStyle::Normal
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct SummaryResponse {
    style: CitationStyle,
    summary: String,
}

async fn get_summary(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let sessions = lock_sessions(&state)?;
    let entry = get_entry(&sessions, &session_id)?;
    let summary = process_markdown(
        entry.session.current_summary(),
        query.has_citations,
        query.style,
    );

    Ok(Json(SummaryResponse {
        style: query.style,
        summary,
    }))
}

fn lock_sessions(
    state: &AppState,
) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionEntry>>, ApiError> {
    state
        .sessions
        .lock()
        .map_err(|_| ApiError::from(anyhow::anyhow!("lock poisoned")))
}

fn get_entry<'a>(
    sessions: &'a HashMap<String, SessionEntry>,
    session_id: &str,
) -> Result<&'a SessionEntry, ApiError> {
    sessions
        .get(session_id)
        .ok_or_else(|| ApiError::not_found(format!("session not found: {session_id}")))
}

fn get_entry_mut<'a>(
    sessions: &'a mut HashMap<String, SessionEntry>,
    session_id: &str,
) -> Result<&'a mut SessionEntry, ApiError> {
    sessions
        .get_mut(session_id)
        .ok_or_else(|| ApiError::not_found(format!("session not found: {session_id}")))
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    backend_url: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: String) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: value.to_string(),
        }
    }
}

impl From<askama::Error> for ApiError {
    fn from(value: askama::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: value.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

//! HTTP route definitions

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::http::middleware::limit_ingest;
use crate::playback::{Point, RenderFrame, ViewCommand, ViewHandle};
use crate::util::time::{unix_millis, uptime_secs};
use crate::ws::handler::ws_handler;

/// Upper bound for a single HTTP request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS: `*` or a comma-separated origin list in CLIENT_ORIGIN
    let origin = state.config.client_origin.trim();
    let allow_origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        let allowed_origins: Vec<header::HeaderValue> = origin
            .split(',')
            .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
            .collect();
        AllowOrigin::list(allowed_origins)
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // Engine push ingest (rate limited)
    let ingest_routes = Router::new()
        .route("/views/:id/frames", post(ingest_handler))
        .layer(middleware::from_fn_with_state(state.clone(), limit_ingest));

    let view_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/views", get(list_views_handler).post(create_view_handler))
        .route("/views/:id", axum::routing::delete(delete_view_handler))
        .route("/views/:id/frame", get(frame_handler))
        .route("/views/:id/formation", put(formation_handler))
        .route("/views/:id/reset", post(reset_handler));

    Router::new()
        .merge(view_routes)
        .merge(ingest_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    server_time: u64,
    active_views: usize,
    subscribers: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    // Views whose task ended on their own
    state.views.sweep();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        server_time: unix_millis(),
        active_views: state.views.active_views(),
        subscribers: state.views.total_subscribers(),
    })
}

// ============================================================================
// View lifecycle
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateViewRequest {
    match_id: Option<String>,
    stream_url: Option<String>,
}

#[derive(Serialize)]
struct ViewResponse {
    view_id: Uuid,
    match_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    following: Option<String>,
    ws_path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListViewsQuery {
    match_id: Option<String>,
}

#[derive(Serialize)]
struct ViewSummary {
    view_id: Uuid,
    match_id: Option<String>,
    subscribers: usize,
}

async fn create_view_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateViewRequest>,
) -> Result<(StatusCode, Json<ViewResponse>), AppError> {
    let following = state
        .engine
        .resolve_url(req.stream_url.as_deref(), req.match_id.as_deref())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let view = state.views.open(req.match_id);
    if let Some(url) = &following {
        state.engine.spawn_follow(url.clone(), view.clone());
    }

    info!(view_id = %view.id, match_id = ?view.match_id, following = ?following, "View created");

    Ok((
        StatusCode::CREATED,
        Json(ViewResponse {
            view_id: view.id,
            match_id: view.match_id.clone(),
            following,
            ws_path: format!("/ws?view={}", view.id),
        }),
    ))
}

async fn list_views_handler(
    State(state): State<AppState>,
    Query(query): Query<ListViewsQuery>,
) -> Json<Vec<ViewSummary>> {
    let handles = match query.match_id.as_deref() {
        Some(match_id) => state.views.find_by_match(match_id),
        None => state.views.list(),
    };
    let views = handles
        .into_iter()
        .map(|v| ViewSummary {
            view_id: v.id,
            subscribers: v.subscriber_count(),
            match_id: v.match_id,
        })
        .collect();
    Json(views)
}

async fn delete_view_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.views.close(&id) {
        info!(view_id = %id, "View deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

async fn reset_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let view = find_view(&state, id)?;
    send(&view, ViewCommand::Reset).await?;
    Ok(StatusCode::ACCEPTED)
}

// ============================================================================
// Frames
// ============================================================================

#[derive(Serialize)]
struct IngestResponse {
    accepted_bytes: usize,
}

async fn ingest_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let view = find_view(&state, id)?;
    let accepted_bytes = body.len();
    send(&view, ViewCommand::Ingest(body)).await?;

    Ok((StatusCode::ACCEPTED, Json(IngestResponse { accepted_bytes })))
}

async fn frame_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RenderFrame>, AppError> {
    let view = find_view(&state, id)?;
    let frame = view.latest_frame();
    Ok(Json(RenderFrame::clone(&frame)))
}

// ============================================================================
// Formation
// ============================================================================

#[derive(Debug, Deserialize)]
struct FormationSlot {
    id: u32,
    x: f32,
    y: f32,
}

#[derive(Serialize)]
struct FormationResponse {
    slots: usize,
}

async fn formation_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(slots): Json<Vec<FormationSlot>>,
) -> Result<(StatusCode, Json<FormationResponse>), AppError> {
    let view = find_view(&state, id)?;
    let slots: Vec<(u32, Point)> = slots
        .into_iter()
        .map(|s| (s.id, Point::new(s.x, s.y)))
        .collect();
    let count = slots.len();
    send(&view, ViewCommand::Formation(slots)).await?;

    Ok((StatusCode::ACCEPTED, Json(FormationResponse { slots: count })))
}

// ============================================================================
// Helpers
// ============================================================================

fn find_view(state: &AppState, id: Uuid) -> Result<ViewHandle, AppError> {
    state.views.get(&id).ok_or_else(|| not_found(id))
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("View {} not found", id))
}

async fn send(view: &ViewHandle, command: ViewCommand) -> Result<(), AppError> {
    view.send(command)
        .await
        .map_err(|e| AppError::Gone(e.to_string()))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gone: {0}")]
    Gone(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Gone(msg) => (StatusCode::GONE, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

// src/web.rs

//! HTTP front end: `POST /api/ingest` runs one ingestion and returns the
//! `IngestResult` as JSON; `GET /api/events?request_id=` streams that
//! request's progress as server-sent events.

use crate::config::{IngestConfig, IngestConfigBuilder, IngestOptions, Strategy};
use crate::core_types::IngestResult;
use crate::errors::Error;
use crate::progress::{channel, Progress};
use axum::extract::Query;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const GLOBAL_CHANNEL: &str = "global";

type ProgressSender = Arc<watch::Sender<Option<String>>>;

/// Latest progress payload per request id.
///
/// A subscriber that connects after a request started still sees the most
/// recent event first. The entry goes away when the request finishes.
#[derive(Default)]
struct ProgressHub {
    channels: Mutex<HashMap<String, ProgressSender>>,
}

impl ProgressHub {
    fn channels(&self) -> MutexGuard<'_, HashMap<String, ProgressSender>> {
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sender(&self, request_id: &str) -> ProgressSender {
        self.channels()
            .entry(request_id.to_string())
            .or_insert_with(|| Arc::new(watch::channel(None).0))
            .clone()
    }

    fn subscribe(&self, request_id: &str) -> watch::Receiver<Option<String>> {
        self.sender(request_id).subscribe()
    }

    fn finish(&self, request_id: &str, sender: &ProgressSender) {
        let mut channels = self.channels();
        if channels
            .get(request_id)
            .is_some_and(|current| Arc::ptr_eq(current, sender))
        {
            channels.remove(request_id);
        }
    }
}

struct AppState {
    hub: Arc<ProgressHub>,
    config: IngestConfig,
}

// --- Request / Response Structs ---
#[derive(Deserialize, Serialize, Debug, Default)]
pub struct IngestRequest {
    pub reference: String,
    pub max_file_size: Option<u64>,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    pub token: Option<String>,
    pub branch: Option<String>,
    /// `disk`, `virtual` or `api`; the server default when absent.
    pub strategy: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

#[derive(Deserialize, Debug)]
pub struct EventQuery {
    pub request_id: Option<String>,
}

// --- Server Startup ---
pub fn create_router(config: IngestConfig) -> Router {
    let state = Arc::new(AppState {
        hub: Arc::new(ProgressHub::default()),
        config,
    });

    Router::new()
        .route("/api/ingest", post(ingest_handler))
        .route("/api/events", get(sse_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(port: u16) -> anyhow::Result<()> {
    let config = IngestConfigBuilder::new().with_env_defaults().build()?;
    let app = create_router(config);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("repodigest API listening on http://{}", addr);
    println!("repodigest API running at http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// --- Handlers ---

async fn sse_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventQuery>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let filter_id = params
        .request_id
        .unwrap_or_else(|| GLOBAL_CHANNEL.to_string());
    let rx = state.hub.subscribe(&filter_id);

    let stream = WatchStream::new(rx)
        .filter_map(|latest| latest.map(|payload| Ok(Event::default().data(payload))));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Response {
    let request_id = req
        .request_id
        .clone()
        .unwrap_or_else(|| GLOBAL_CHANNEL.to_string());
    tracing::debug!(request_id = %request_id, reference = %req.reference, "ingest request");

    match run_request(&state, req, request_id).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn run_request(
    state: &AppState,
    req: IngestRequest,
    request_id: String,
) -> Result<IngestResult, Error> {
    let mut config = state.config.clone();
    if let Some(strategy) = req.strategy.as_deref().filter(|s| !s.trim().is_empty()) {
        config.strategy = strategy.parse::<Strategy>()?;
    }
    let defaults = IngestOptions::default();
    let options = IngestOptions {
        max_file_size: req.max_file_size.unwrap_or(defaults.max_file_size),
        include_patterns: req.include_patterns,
        exclude_patterns: req.exclude_patterns,
        auth_token: req.token.filter(|t| !t.trim().is_empty()),
        branch: req.branch.filter(|b| !b.trim().is_empty()),
    };

    let progress = forward_progress(state.hub.clone(), request_id);
    crate::ingest_with_timeout(&req.reference, &options, &config, Some(progress)).await
}

/// Relays progress events to SSE subscribers of `request_id` as JSON.
fn forward_progress(hub: Arc<ProgressHub>, request_id: String) -> Progress {
    let (progress, mut events) = channel();
    let sender = hub.sender(&request_id);
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let payload = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!("Could not serialize progress event: {}", e);
                    continue;
                }
            };
            // Stored even without subscribers so late ones get it.
            sender.send_replace(Some(payload));
        }
        hub.finish(&request_id, &sender);
    });
    progress
}

fn error_response(error: &Error) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!("Ingestion failed: {}", error);
    } else {
        tracing::info!("Ingestion rejected: {}", error);
    }
    let body = ErrorResponse {
        error: error.to_string(),
        kind: error.kind().to_string(),
    };
    (status, Json(body)).into_response()
}

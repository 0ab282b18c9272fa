//! Demonstration HTTP ingest/read surface for the aggregation engine.
//!
//! Exists to exercise the `/events`, `/metrics`, `/stats`, `/health`, `/ready` contract
//! end-to-end; production concerns like CORS policy, request-id propagation, and access
//! logging middleware belong to the real gateway this core would sit behind. Structured the
//! way the teacher's own HTTP entrypoint is: a small `AppState`, one `AppError` enum that
//! implements `IntoResponse`, and graceful shutdown on `ctrl_c`/`SIGTERM`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use event_aggregator::config::ServiceConfig;
use event_aggregator::error::AggregatorError;
use event_aggregator::event::{validate_batch_size, Event};
use event_aggregator::lifecycle::Service;

/// Command-line overrides layered on top of `ServiceConfig::load`'s file/env precedence,
/// mirroring the teacher CLI's `clap::Parser` entrypoint (`src/bin/llm-analytics.rs`).
#[derive(Debug, Parser)]
#[command(name = "ingestion-service", about = "Real-time event aggregation ingest surface")]
struct Cli {
    /// Path to a YAML config file; overrides `ANALYTICS_CONFIG` and the default `config.yaml`.
    #[arg(long, env = "ANALYTICS_CONFIG")]
    config: Option<String>,

    /// HTTP port to listen on; overrides the configured `http_port`.
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Clone)]
struct AppState {
    service: Arc<Service>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Some(config_path) = &cli.config {
        std::env::set_var("ANALYTICS_CONFIG", config_path);
    }

    let mut config = ServiceConfig::load()?;
    if let Some(port) = cli.port {
        config.http_port = port;
    }
    let http_port = config.http_port;
    let service = Arc::new(Service::start(&config));

    let state = AppState {
        service: service.clone(),
    };

    let app = Router::new()
        .route("/events", post(ingest_event))
        .route("/events/batch", post(ingest_batch))
        .route("/metrics", get(list_metrics))
        .route("/metrics/:name", get(get_metric))
        .route("/stats", get(get_stats))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    info!(%addr, "ingestion service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match Arc::try_unwrap(service) {
        Ok(service) => service.shutdown().await,
        Err(_) => error!("service still has outstanding references at shutdown; skipping drain"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    status: &'static str,
    event_id: String,
    #[serde(rename = "type")]
    event_type: String,
}

async fn ingest_event(
    State(state): State<AppState>,
    Json(event): Json<Event>,
) -> Result<impl IntoResponse, AppError> {
    let event = event.normalize().map_err(AppError::from)?;
    let event_id = event.id.clone();
    let event_type = event.event_type.clone();
    state.service.queue().try_enqueue(event).map_err(AppError::from)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            status: "accepted",
            event_id,
            event_type,
        }),
    ))
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    total: usize,
    accepted: usize,
    rejected: usize,
}

async fn ingest_batch(
    State(state): State<AppState>,
    Json(events): Json<Vec<Event>>,
) -> Result<impl IntoResponse, AppError> {
    validate_batch_size(events.len()).map_err(AppError::from)?;
    let total = events.len();
    let queue = state.service.queue();

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    for raw in events {
        let normalized = match raw.normalize() {
            Ok(event) => event,
            Err(_) => {
                rejected += 1;
                continue;
            }
        };
        match queue.try_enqueue(normalized) {
            Ok(()) => accepted += 1,
            Err(AggregatorError::Backpressure) => {
                rejected += 1;
            }
            Err(other) => return Err(AppError::from(other)),
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchResponse {
            total,
            accepted,
            rejected,
        }),
    ))
}

async fn list_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let data = state.service.aggregator().global_metrics();
    Json(json!({
        "status": "ok",
        "message": "global metric snapshot",
        "data": data,
    }))
}

async fn get_metric(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let aggregator = state.service.aggregator();
    let metric = aggregator
        .global_metrics()
        .remove(&name)
        .ok_or_else(|| AppError::NotFound(format!("metric '{name}' not found")))?;
    Ok(Json(json!({
        "status": "ok",
        "message": "metric snapshot",
        "data": metric,
    })))
}

async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.aggregator().stats())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": event_aggregator::VERSION,
        "time": Utc::now(),
    }))
}

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ready",
        "version": event_aggregator::VERSION,
        "queue_capacity": state.service.queue().capacity(),
        "time": Utc::now(),
    }))
}

enum AppError {
    BadRequest(String),
    NotFound(String),
    Backpressure,
    Shutdown,
}

impl From<AggregatorError> for AppError {
    fn from(err: AggregatorError) -> Self {
        match err {
            AggregatorError::BadRequest(msg) => AppError::BadRequest(msg),
            AggregatorError::Backpressure => AppError::Backpressure,
            AggregatorError::Shutdown => AppError::Shutdown,
            AggregatorError::Internal(msg) => AppError::BadRequest(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Backpressure => (
                StatusCode::SERVICE_UNAVAILABLE,
                "ingress queue is full".to_string(),
            ),
            AppError::Shutdown => (
                StatusCode::SERVICE_UNAVAILABLE,
                "aggregator is shutting down".to_string(),
            ),
        };
        (status, Json(json!({ "status": "error", "message": message }))).into_response()
    }
}

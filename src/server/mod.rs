//! HTTP boundary
//!
//! Maps `POST /add/` and `POST /query/` onto the pipelines. Every request gets
//! its own cancellation token, cancelled when the request times out or the
//! handler is dropped because the client went away.

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::pipeline::{Document, IngestionPipeline, QueryPipeline};
use crate::{RagError, Result};

/// Shared handler state, built once at startup
#[derive(Clone)]
pub struct AppState {
    ingest: Arc<IngestionPipeline>,
    query: Arc<QueryPipeline>,
    request_timeout: Duration,
}

impl AppState {
    #[inline]
    pub fn new(
        ingest: Arc<IngestionPipeline>,
        query: Arc<QueryPipeline>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            ingest,
            query,
            request_timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AddRequest {
    #[serde(rename = "Documents", alias = "documents")]
    documents: Vec<Document>,
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    #[serde(rename = "Content", alias = "content")]
    content: String,
}

/// Build the router for the two pipeline endpoints
#[inline]
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/add/", post(add_documents))
        .route("/query/", post(query))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C
#[inline]
pub async fn serve(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let address = config.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state, config.max_body_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

async fn add_documents(State(state): State<AppState>, body: Bytes) -> Result<StatusCode> {
    let request: AddRequest = parse_json(&body)?;
    let ingest = Arc::clone(&state.ingest);

    let count = with_request_scope(state.request_timeout, |cancel| async move {
        ingest.ingest(&request.documents, &cancel).await
    })
    .await?;

    info!("ingested {} documents", count);
    Ok(StatusCode::OK)
}

async fn query(State(state): State<AppState>, body: Bytes) -> Result<Json<String>> {
    let request: QueryRequest = parse_json(&body)?;
    let pipeline = Arc::clone(&state.query);

    let answer = with_request_scope(state.request_timeout, |cancel| async move {
        pipeline.query(&request.content, &cancel).await
    })
    .await?;

    Ok(Json(answer))
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| RagError::MalformedRequest(e.to_string()))
}

/// Run `operation` with a fresh cancellation token that fires on timeout or
/// when this future is dropped
async fn with_request_scope<T, F, Fut>(timeout: Duration, operation: F) -> Result<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    tokio::time::timeout(timeout, operation(cancel.clone()))
        .await
        .unwrap_or_else(|_| {
            cancel.cancel();
            Err(RagError::TimedOut(timeout))
        })
}

impl IntoResponse for RagError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_client_error() {
            warn!("rejecting request: {}", self);
        } else {
            error!("request failed: {}", self);
        }

        (status, self.to_string()).into_response()
    }
}

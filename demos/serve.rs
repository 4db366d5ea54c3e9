use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing_subscriber::EnvFilter;

use range_relay::{
    content_disposition, spawn_relay, ReaderUpstream, RelayConfig, RequestedRange, TransferCounters,
};

#[derive(Clone)]
struct AppState {
    config: RelayConfig,
    counters: Arc<TransferCounters>,
}

#[derive(Debug, Deserialize)]
struct FileRequest {
    path: String,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid relay configuration");
            return;
        }
    };
    let state = AppState { config, counters: Arc::new(TransferCounters::new()) };

    let router = Router::new()
        .route("/", get(|| async { "Hello, World!" }))
        .route("/file", get(get_file))
        .route("/stats", get(get_stats))
        .with_state(state);

    let listener = match tokio::net::TcpListener::bind("0.0.0.0:3000").await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "failed to bind");
            return;
        }
    };
    tracing::info!("listening on 0.0.0.0:3000");
    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!(error = %e, "server stopped");
    }
}

async fn get_stats(State(state): State<AppState>) -> String {
    format!("downloaded {} bytes\n", state.counters.bytes_downloaded())
}

async fn get_file(
    State(state): State<AppState>,
    RequestedRange(range): RequestedRange,
    Query(q): Query<FileRequest>,
) -> Response {
    let path = PathBuf::from(&q.path);
    let mut file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) => return (StatusCode::NOT_FOUND, format!("File not found: {}", e)).into_response(),
    };

    let (status, start, length) = match range {
        Some(range) => {
            if let Err(e) = file.seek(std::io::SeekFrom::Start(range.start())).await {
                return (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response();
            }
            (StatusCode::PARTIAL_CONTENT, range.start(), range.len())
        }
        None => (StatusCode::OK, 0, None),
    };
    tracing::debug!(path = %path.display(), start, ?length, "serving file");

    let upstream = ReaderUpstream::new(file.take(length.unwrap_or(u64::MAX)));
    let (body, relay) = spawn_relay(upstream, state.config);

    let counters = state.counters.clone();
    tokio::spawn(async move {
        if let Ok(Ok(outcome)) = relay.await {
            counters.record_download(&outcome);
        }
    });

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let filename = path.file_name().and_then(|name| name.to_str()).unwrap_or("download");
    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&content_disposition(filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

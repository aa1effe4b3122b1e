//! Purpose: Provide the HTTP/JSON gateway surface for parsegate.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum-based dispatcher: validate, then parse locally or forward to the peer.
//! Invariants: All responses are JSON; errors use the `{"detail": ...}` envelope.
//! Invariants: Validation order is method, path shape, dataset, file type.
//! Invariants: Forward mode preserves the peer's status code on error.

use axum::Json;
use axum::Router;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use parsegate::api::{Dataset, Error, ErrorKind, FileType, PeerClient, parse_record};

const WELCOME: &str = "Welcome to the Data Parsing Server (parsegate)!";

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub peer_url: String,
    pub peer_timeout: Duration,
}

struct AppState {
    data_dir: PathBuf,
    peer: PeerClient,
}

#[derive(Debug, Deserialize)]
struct ParseQuery {
    direct: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let peer = PeerClient::new(config.peer_url)?.with_timeout(config.peer_timeout);
    tracing::info!(
        data_dir = %config.data_dir.display(),
        peer = %peer.base_url(),
        "starting gateway"
    );
    if !config.data_dir.is_dir() {
        tracing::warn!(
            data_dir = %config.data_dir.display(),
            "data directory does not exist; local parses will fail"
        );
    }

    let state = Arc::new(AppState {
        data_dir: config.data_dir,
        peer,
    });

    let app = Router::new()
        .route("/", get(root).fallback(method_not_allowed))
        .route("/parse/:dataset", get(parse_all).fallback(method_not_allowed))
        .route(
            "/parse/:dataset/:file_type",
            get(parse_one).fallback(method_not_allowed),
        )
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if config.peer_timeout.is_zero() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--peer-timeout-ms must be greater than zero")
            .with_hint("Use a positive value like 30000."));
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn root() -> Response {
    json_response(json!({
        "message": WELCOME,
        "available_sets": sets_json(),
        "available_formats": formats_json(),
    }))
}

async fn parse_all(
    State(state): State<Arc<AppState>>,
    AxumPath(dataset): AxumPath<String>,
    Query(query): Query<ParseQuery>,
) -> Response {
    let dataset: Dataset = match dataset.parse() {
        Ok(dataset) => dataset,
        Err(err) => return error_response(err),
    };

    if !is_direct(&query) {
        return forward(state, dataset, None).await;
    }

    // per-type failures are captured inline; partial success is the
    // normal outcome of parse-all mode
    let mut result = serde_json::Map::new();
    for file_type in FileType::ALL {
        let entry = match parse_record(&state.data_dir, dataset, file_type) {
            Ok(record) => Value::Object(record),
            Err(err) => json!({ "error": err.to_string() }),
        };
        result.insert(file_type.as_str().to_string(), entry);
    }
    json_response(json!({ "set": dataset.as_str(), "data": result }))
}

async fn parse_one(
    State(state): State<Arc<AppState>>,
    AxumPath((dataset, file_type)): AxumPath<(String, String)>,
    Query(query): Query<ParseQuery>,
) -> Response {
    let dataset: Dataset = match dataset.parse() {
        Ok(dataset) => dataset,
        Err(err) => return error_response(err),
    };
    let file_type: FileType = match file_type.parse() {
        Ok(file_type) => file_type,
        Err(err) => return error_response(err),
    };

    if !is_direct(&query) {
        return forward(state, dataset, Some(file_type)).await;
    }

    match parse_record(&state.data_dir, dataset, file_type) {
        Ok(record) => json_response(json!({
            "set": dataset.as_str(),
            "format": file_type.as_str(),
            "data": record,
        })),
        Err(err) => error_response(err),
    }
}

/// Relay to the peer on a blocking task; the peer client is synchronous.
async fn forward(
    state: Arc<AppState>,
    dataset: Dataset,
    file_type: Option<FileType>,
) -> Response {
    let peer = state.peer.clone();
    let joined = tokio::task::spawn_blocking(move || match file_type {
        Some(file_type) => peer.fetch_one(dataset, file_type),
        None => peer.fetch_all(dataset),
    })
    .await;

    match joined {
        Ok(Ok(body)) => json_response(body),
        Ok(Err(err)) => error_response(err),
        Err(err) => error_response(
            Error::new(ErrorKind::Internal)
                .with_message("peer request task failed")
                .with_source(err),
        ),
    }
}

async fn fallback(uri: Uri) -> Response {
    if uri.path() == "/parse" || uri.path().starts_with("/parse/") {
        return error_response(Error::new(ErrorKind::Usage).with_message("invalid path"));
    }
    error_response(Error::new(ErrorKind::NotFound).with_message("not found"))
}

async fn method_not_allowed() -> Response {
    method_not_allowed_response()
}

fn method_not_allowed_response() -> Response {
    error_response(
        Error::new(ErrorKind::Usage)
            .with_message("method not allowed")
            .with_status(405),
    )
}

/// Only the literal string "true" selects local parsing; anything else
/// forwards to the peer.
fn is_direct(query: &ParseQuery) -> bool {
    query.direct.as_deref() == Some("true")
}

fn sets_json() -> Vec<&'static str> {
    Dataset::ALL.iter().map(|dataset| dataset.as_str()).collect()
}

fn formats_json() -> Vec<&'static str> {
    FileType::ALL
        .iter()
        .map(|file_type| file_type.as_str())
        .collect()
}

fn json_response(payload: Value) -> Response {
    Json(payload).into_response()
}

fn error_response(err: Error) -> Response {
    let status = err
        .status()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or_else(|| match err.kind() {
            ErrorKind::Usage | ErrorKind::Unsupported => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Malformed | ErrorKind::Io | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        });
    let body = ErrorBody {
        detail: err.message().unwrap_or("error").to_string(),
    };
    (status, Json(body)).into_response()
}

//! Read-only query endpoint over the enriched store.
//!
//! `GET /getdata` returns every stored record as a JSON array, gated by a
//! shared secret sent in the `x-api-key` header or the `key` query
//! parameter. `GET /healthz` is unauthenticated.
use crate::store::load_records;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

pub const HEALTHZ_PATH: &str = "/healthz";
pub const DATA_PATH: &str = "/getdata";
pub const API_KEY_HEADER: &str = "x-api-key";
const HEALTHZ_STATUS: &str = "ok";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("listen address may not be empty")]
    EmptyListenAddr,
    #[error("invalid listen address `{address}`: {source}")]
    InvalidListenAddr {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to determine local address: {source}")]
    LocalAddr {
        #[source]
        source: std::io::Error,
    },
    #[error("axum server error: {source}")]
    Serve {
        #[source]
        source: std::io::Error,
    },
}

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

#[derive(Debug)]
struct StateInner {
    store_path: PathBuf,
    endpoint_key: Option<String>,
}

impl AppState {
    /// `endpoint_key = None` keeps `/getdata` closed.
    pub fn new(store_path: PathBuf, endpoint_key: Option<String>) -> Self {
        Self {
            inner: Arc::new(StateInner {
                store_path,
                endpoint_key,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthzResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Default, Deserialize)]
struct KeyQuery {
    key: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(HEALTHZ_PATH, get(healthz))
        .route(DATA_PATH, get(get_data))
        .with_state(state)
}

/// Bind `listen_addr` and serve until Ctrl-C or SIGTERM.
pub async fn serve(listen_addr: &str, state: AppState) -> Result<(), ServerError> {
    let addr = parse_listen_addr(listen_addr)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: addr.to_string(),
            source,
        })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::LocalAddr { source })?;
    tracing::info!(%local_addr, "query endpoint listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .map_err(|source| ServerError::Serve { source })?;
    tracing::info!("query endpoint stopped");
    Ok(())
}

async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse {
        status: HEALTHZ_STATUS,
    })
}

async fn get_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Response {
    let Some(expected) = state.inner.endpoint_key.as_deref() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "endpoint key not configured");
    };
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or(query.key);
    let Some(provided) = provided else {
        return error_response(StatusCode::UNAUTHORIZED, "missing API key");
    };
    if !keys_match(provided.trim(), expected) {
        tracing::warn!("rejected query with wrong API key");
        return error_response(StatusCode::FORBIDDEN, "invalid API key");
    }

    let path = state.inner.store_path.clone();
    match tokio::task::spawn_blocking(move || load_records(&path)).await {
        Ok(Ok(records)) => {
            tracing::debug!(records = records.len(), "served enriched records");
            Json(records).into_response()
        }
        Ok(Err(err)) => {
            tracing::error!(error = %format!("{err:#}"), "could not read enriched store");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not read store")
        }
        Err(err) => {
            tracing::error!(error = %err, "store reader task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not read store")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Compare without short-circuiting on the first differing byte.
fn keys_match(provided: &str, expected: &str) -> bool {
    let (provided, expected) = (provided.as_bytes(), expected.as_bytes());
    provided.len() == expected.len()
        && provided
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ServerError> {
    let trimmed = addr.trim();
    if trimmed.is_empty() {
        return Err(ServerError::EmptyListenAddr);
    }
    trimmed
        .parse()
        .map_err(|source| ServerError::InvalidListenAddr {
            address: trimmed.to_string(),
            source,
        })
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "failed to capture Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to capture SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C; shutting down"),
        () = sigterm => tracing::info!("received SIGTERM; shutting down"),
    }
}

// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Web front end for the sync daemon.
//!
//! The browser is the only place a human can answer the worker's credential
//! prompts; every handler here talks to the worker exclusively through the
//! shared [`StatusExchange`].
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Handshake status, progress flags, configs, current user
//! - `POST /code` - Submit a one-time MFA code
//! - `POST /password` - Submit a password
//! - `POST /resume` - Ask the worker to sync now
//! - `POST /cancel` - Ask the worker to wind down
//! - `GET /api/libraries` - List libraries (needs a cached session)
//! - `GET /api/folders?library=` - List folders with counts
//! - `GET /api/albums?library=` - List albums with counts
//! - `POST /api/sync` - Enqueue a sync job
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use photopull::exchange::StatusExchange;
//! use photopull::server::Server;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let exchange = Arc::new(StatusExchange::new());
//! let server = Server::new(8484);
//! server.start(exchange).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};

use crate::config::UserConfigView;
use crate::errors::{ApiResult, UserError};
use crate::exchange::{Progress, StatusExchange, SyncRequest};
use crate::remote::{CollectionInfo, LibrarySummary, VaultSession};

// Maximum request body size (64KB); nothing here legitimately sends more
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Server state shared across handlers.
pub struct AppState {
    /// The exchange shared with the worker.
    pub exchange: Arc<StatusExchange>,
}

/// Web server configuration.
#[derive(Debug)]
pub struct Server {
    /// Port to listen on.
    port: u16,
    /// Address to bind to (defaults to 127.0.0.1 for security).
    bind_address: String,
}

impl Default for Server {
    fn default() -> Self {
        Self::new(8484)
    }
}

impl Server {
    /// Create a new server with the specified port.
    /// By default, binds to 127.0.0.1 (localhost only) for security.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            bind_address: "127.0.0.1".to_string(),
        }
    }

    /// Set the bind address.
    /// Use "0.0.0.0" to allow network access, "127.0.0.1" (default) for localhost only.
    pub fn with_bind_address(mut self, addr: impl Into<String>) -> Self {
        self.bind_address = addr.into();
        self
    }

    /// Build the router with all routes.
    pub fn build_router(&self, exchange: Arc<StatusExchange>) -> Router {
        let state = Arc::new(AppState { exchange });

        // Credential submissions get a tight per-IP rate limit; everything
        // else is local status polling and stays unthrottled.
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(1)
                .burst_size(10)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .expect("Failed to build governor config"),
        );

        let credential_routes = Router::new()
            .route("/code", post(code_handler))
            .route("/password", post(password_handler))
            .layer(GovernorLayer {
                config: governor_conf,
            });

        Router::new()
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .route("/resume", post(resume_handler))
            .route("/cancel", post(cancel_handler))
            .route("/api/libraries", get(libraries_handler))
            .route("/api/folders", get(folders_handler))
            .route("/api/albums", get(albums_handler))
            .route("/api/sync", post(sync_handler))
            .merge(credential_routes)
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .with_state(state)
    }

    /// Start the server with graceful shutdown.
    pub async fn start(&self, exchange: Arc<StatusExchange>) -> Result<()> {
        let progress = exchange.progress();
        let router = self.build_router(exchange);
        let addr = format!("{}:{}", self.bind_address, self.port);

        tracing::info!("Starting web front end on {}", addr);

        if self.bind_address == "0.0.0.0" {
            tracing::warn!(
                "Binding to 0.0.0.0 exposes the credential prompts to the network. \
                Use 127.0.0.1 (default) for local-only access."
            );
        }

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                anyhow::anyhow!(
                    "Port {} is already in use. Another photopull instance may be running; \
                    stop it or pick a different port with: photopull config set-port <PORT>",
                    self.port
                )
            } else {
                anyhow::anyhow!("Failed to bind to {}: {}", addr, e)
            }
        })?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(progress))
            .await?;

        Ok(())
    }

    /// Get the port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// The full front-end view of the exchange.
#[derive(Serialize)]
struct StatusResponse {
    status: String,
    error: Option<String>,
    progress: ProgressView,
    global_config: Option<GlobalConfigView>,
    user_configs: Vec<UserConfigView>,
    current_user: Option<String>,
}

#[derive(Serialize)]
struct ProgressView {
    resume: bool,
    cancel: bool,
}

#[derive(Serialize)]
struct GlobalConfigView {
    directory: String,
    watch_interval_secs: u64,
    vault_url: String,
}

/// A submitted MFA code.
#[derive(Deserialize)]
struct CodeSubmission {
    code: String,
}

/// A submitted password.
#[derive(Deserialize)]
struct PasswordSubmission {
    password: String,
}

/// Acknowledgement for an accepted credential.
#[derive(Serialize)]
struct SubmitResponse {
    accepted: bool,
    status: String,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Deserialize)]
struct LibraryQuery {
    #[serde(default = "default_library")]
    library: String,
}

fn default_library() -> String {
    "primary".to_string()
}

#[derive(Serialize)]
struct CollectionsResponse {
    library: String,
    collections: Vec<CollectionInfo>,
}

#[derive(Serialize)]
struct SyncQueuedResponse {
    queued: bool,
    targets: usize,
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check handler.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Everything the front end needs to render the current page: handshake
/// status, gated error, flags, configs and the user being processed.
///
/// Fields are read through separate exchange calls, so the view is not a
/// single atomic snapshot; the page poll cadence makes that harmless.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let exchange = &state.exchange;
    let progress = exchange.progress();

    Json(StatusResponse {
        status: exchange.status().to_string(),
        error: exchange.error(),
        progress: ProgressView {
            resume: progress.resume_requested(),
            cancel: progress.cancel_requested(),
        },
        global_config: exchange.global_config().map(|g| GlobalConfigView {
            directory: g.directory.display().to_string(),
            watch_interval_secs: g.watch_interval_secs,
            vault_url: g.vault_url,
        }),
        user_configs: exchange
            .user_configs()
            .iter()
            .map(|u| u.public_view())
            .collect(),
        current_user: exchange.current_user(),
    })
}

/// Submit a one-time MFA code.
///
/// A `false` from the exchange means the submission was stale or duplicate
/// (the worker is not asking, or another submission won); nothing changed
/// and the client gets a 400 to re-render from `/status`.
async fn code_handler(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<CodeSubmission>,
) -> ApiResult<Json<SubmitResponse>> {
    let code = submission.code.trim();
    if code.is_empty() {
        return Err(UserError::invalid_request(
            "Enter the verification code.",
            Some("code"),
            None,
        ));
    }

    if state.exchange.set_payload(code) {
        Ok(Json(SubmitResponse {
            accepted: true,
            status: state.exchange.status().to_string(),
        }))
    } else {
        Err(UserError::invalid_request(
            "That code could not be used. The prompt may have moved on; check the status page.",
            Some("code"),
            Some(&format!(
                "set_payload rejected in state {}",
                state.exchange.status()
            )),
        ))
    }
}

/// Submit a password.
async fn password_handler(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<PasswordSubmission>,
) -> ApiResult<Json<SubmitResponse>> {
    if submission.password.is_empty() {
        return Err(UserError::invalid_request(
            "Enter the password.",
            Some("password"),
            None,
        ));
    }

    if state.exchange.set_payload(&submission.password) {
        Ok(Json(SubmitResponse {
            accepted: true,
            status: state.exchange.status().to_string(),
        }))
    } else {
        Err(UserError::invalid_request(
            "The password could not be used. The prompt may have moved on; check the status page.",
            Some("password"),
            Some(&format!(
                "set_payload rejected in state {}",
                state.exchange.status()
            )),
        ))
    }
}

/// Raise the advisory resume flag.
async fn resume_handler(State(state): State<Arc<AppState>>) -> Json<OkResponse> {
    state.exchange.progress().request_resume();
    Json(OkResponse { ok: true })
}

/// Raise the advisory cancel flag.
async fn cancel_handler(State(state): State<Arc<AppState>>) -> Json<OkResponse> {
    state.exchange.progress().request_cancel();
    Json(OkResponse { ok: true })
}

/// Pull the cached session out of the exchange, or tell the caller to
/// finish authenticating first.
fn require_session(state: &AppState) -> ApiResult<Arc<VaultSession>> {
    state
        .exchange
        .session()
        .ok_or_else(|| UserError::authentication_required(Some("no session cached in exchange")))
}

/// List the libraries visible to the authenticated account.
async fn libraries_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<LibrarySummary>> {
    let session = require_session(&state)?;
    let libraries = session
        .libraries()
        .await
        .map_err(|e| UserError::bad_gateway(&e.to_string()))?;
    Ok(Json(libraries))
}

/// List folders (with asset counts) in one library.
async fn folders_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LibraryQuery>,
) -> ApiResult<Json<CollectionsResponse>> {
    let session = require_session(&state)?;
    let collections = session
        .folders(&query.library)
        .await
        .map_err(|e| UserError::bad_gateway(&e.to_string()))?;
    Ok(Json(CollectionsResponse {
        library: query.library,
        collections,
    }))
}

/// List albums (with asset counts) in one library.
async fn albums_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LibraryQuery>,
) -> ApiResult<Json<CollectionsResponse>> {
    let session = require_session(&state)?;
    let collections = session
        .albums(&query.library)
        .await
        .map_err(|e| UserError::bad_gateway(&e.to_string()))?;
    Ok(Json(CollectionsResponse {
        library: query.library,
        collections,
    }))
}

/// Enqueue a sync job for the worker and nudge it awake.
///
/// Validation happens here, before the exchange is touched: the slot only
/// ever holds requests the worker can act on.
async fn sync_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SyncRequest>,
) -> ApiResult<Json<SyncQueuedResponse>> {
    if let Err(reason) = request.validate() {
        return Err(UserError::invalid_request(reason, None, None));
    }

    let targets = request.target_count();
    state.exchange.set_sync_request(request);
    state.exchange.progress().request_resume();

    Ok(Json(SyncQueuedResponse {
        queued: true,
        targets,
    }))
}

/// Graceful shutdown signal handler.
///
/// Waits for SIGINT/SIGTERM, then raises the cancel flag so the worker
/// winds down alongside the server.
async fn shutdown_signal(progress: Arc<Progress>) {
    // On Unix, listen for SIGINT and SIGTERM
    // On Windows, fall back to Ctrl+C only
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
    }

    progress.request_cancel();
    tracing::info!("Cancel flag raised for the worker, shutting down server");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Status;

    #[test]
    fn test_server_creation() {
        let server = Server::new(3000);
        assert_eq!(server.port(), 3000);
    }

    #[test]
    fn test_server_default() {
        let server = Server::default();
        assert_eq!(server.port(), 8484);
    }

    #[test]
    fn test_build_router() {
        let exchange = Arc::new(StatusExchange::new());
        let server = Server::new(8484);
        let _router = server.build_router(exchange);
    }

    #[tokio::test]
    async fn test_status_handler_reflects_exchange() {
        let exchange = Arc::new(StatusExchange::new());
        exchange.replace_status(Status::NoInputNeeded, Status::NeedMfa);
        exchange.set_current_user("ansel");
        let state = Arc::new(AppState {
            exchange: Arc::clone(&exchange),
        });

        let Json(response) = status_handler(State(state)).await;
        assert_eq!(response.status, "need_mfa");
        assert_eq!(response.current_user, Some("ansel".to_string()));
        assert!(response.global_config.is_none());
        assert!(response.user_configs.is_empty());
    }

    #[tokio::test]
    async fn test_code_handler_rejects_when_idle() {
        let exchange = Arc::new(StatusExchange::new());
        let state = Arc::new(AppState { exchange });

        let result = code_handler(
            State(state),
            Json(CodeSubmission {
                code: "123456".to_string(),
            }),
        )
        .await;
        let err = result.err().expect("idle exchange must reject a code");
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_code_handler_accepts_when_prompted() {
        let exchange = Arc::new(StatusExchange::new());
        exchange.replace_status(Status::NoInputNeeded, Status::NeedMfa);
        let state = Arc::new(AppState {
            exchange: Arc::clone(&exchange),
        });

        let Json(response) = code_handler(
            State(state),
            Json(CodeSubmission {
                code: " 123456 ".to_string(),
            }),
        )
        .await
        .expect("prompted exchange must accept a code");

        assert!(response.accepted);
        assert_eq!(response.status, "supplied_mfa");
        // Whitespace is trimmed before the exchange sees the code
        assert_eq!(exchange.payload(), Some("123456".to_string()));
    }

    #[tokio::test]
    async fn test_sync_handler_validates_before_enqueue() {
        let exchange = Arc::new(StatusExchange::new());
        let state = Arc::new(AppState {
            exchange: Arc::clone(&exchange),
        });

        let empty = SyncRequest {
            folders: vec![],
            albums: vec![],
            directory: std::path::PathBuf::from("/photos"),
            library: "primary".to_string(),
        };
        let result = sync_handler(State(Arc::clone(&state)), Json(empty)).await;
        assert!(result.is_err());
        assert!(exchange.take_sync_request().is_none());

        let good = SyncRequest {
            folders: vec!["Camera Roll".to_string()],
            albums: vec![],
            directory: std::path::PathBuf::from("/photos"),
            library: "primary".to_string(),
        };
        let Json(response) = sync_handler(State(state), Json(good)).await.unwrap();
        assert!(response.queued);
        assert_eq!(response.targets, 1);
        assert!(exchange.take_sync_request().is_some());
        assert!(exchange.progress().resume_requested());
    }
}

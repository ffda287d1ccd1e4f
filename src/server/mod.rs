//! HTTP surface
//!
//! Receives the slash command and the button callbacks posted by the chat
//! platform and answers with the rendered message payloads.

use crate::config::Config;
use crate::polls::render::{self, ActionResponse, PollMessage};
use crate::polls::{parse_command, Poll, PollError, PollService, Tally};
use crate::store::StoreError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(String),
}

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: PollService,
    /// Base URL embedded in button callbacks
    pub public_url: String,
}

impl AppState {
    pub fn new(service: PollService, public_url: impl Into<String>) -> Self {
        Self {
            service,
            public_url: public_url.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndResponse {
    #[serde(flatten)]
    pub response: ActionResponse,
    pub tally: Tally,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub removed: bool,
    pub ledger_retained: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let status = match &self {
            PollError::InputValidation(_) | PollError::InvalidOption { .. } => {
                StatusCode::BAD_REQUEST
            }
            PollError::NotFound(_) => StatusCode::NOT_FOUND,
            PollError::Contention { .. } => StatusCode::CONFLICT,
            PollError::CorruptRecord { .. } | PollError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, PollError>;

/// Build the router over shared state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/command", post(command_handler))
        .route("/polls/{poll_id}", get(poll_handler).delete(remove_handler))
        .route(
            "/polls/{poll_id}/answers/{option_id}/vote",
            post(vote_handler),
        )
        .route("/polls/{poll_id}/end", post(end_handler))
        .with_state(Arc::new(state))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create a poll from slash-command text
async fn command_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> ApiResult<PollMessage> {
    let new_poll = parse_command(&request.text)?;
    let poll = state.service.create(new_poll).await?;
    Ok(Json(render::poll_message(&poll, &state.public_url)))
}

async fn poll_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
) -> ApiResult<Poll> {
    Ok(Json(state.service.get(&poll_id).await?))
}

async fn vote_handler(
    State(state): State<Arc<AppState>>,
    Path((poll_id, option_id)): Path<(String, String)>,
    Json(request): Json<VoteRequest>,
) -> ApiResult<ActionResponse> {
    let changed = state
        .service
        .record_vote(&poll_id, &option_id, &request.user_id)
        .await?;
    Ok(Json(render::vote_ack(changed)))
}

async fn end_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
) -> ApiResult<EndResponse> {
    let (poll, tally) = state.service.end(&poll_id).await?;
    Ok(Json(EndResponse {
        response: render::end_response(&poll, &tally),
        tally,
    }))
}

async fn remove_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
) -> ApiResult<RemoveResponse> {
    let outcome = state.service.remove(&poll_id).await?;
    Ok(Json(RemoveResponse {
        removed: true,
        ledger_retained: outcome.ledger_retained(),
    }))
}

/// Build the poll service described by `config`
pub async fn build_service(config: &Config) -> Result<PollService, StoreError> {
    let store = config.storage.open().await?;
    Ok(PollService::new(store)
        .with_vote_strategy(config.voting.strategy, config.voting.max_attempts))
}

/// Run the HTTP server until Ctrl-C
pub async fn serve(config: &Config) -> Result<(), ServerError> {
    let service = build_service(config).await?;
    let app = create_router(AppState::new(service, config.public_url()));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    let storage = if config.storage.is_persistent() {
        "file"
    } else {
        "memory"
    };
    tracing::info!(
        address = %addr,
        public_url = %config.public_url(),
        storage,
        "Starting poll server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

    tracing::info!("Poll server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

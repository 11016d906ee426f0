//! Route handlers and the JSON error envelope.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::SharedState;
use crate::error::{AppError, AppResult};
use crate::story::{Direction, HistoryEntry, StoryNode};

/// Body of `POST /next`. Every field is optional on the wire so missing
/// values produce our own 400 instead of a generic rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextRequest {
    #[serde(default)]
    pub current_node: Option<StoryNode>,
    #[serde(default)]
    pub choice: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<HistoryEntry>>,
    /// Depth of the node to produce. Defaults to one below `currentNode`.
    #[serde(default)]
    pub depth: Option<u32>,
}

/// A validated `POST /next` body.
#[derive(Debug, Clone)]
pub struct NextInput {
    pub current: StoryNode,
    pub choice: Direction,
    pub history: Vec<HistoryEntry>,
    pub depth: u32,
}

impl NextRequest {
    pub fn validate(self) -> AppResult<NextInput> {
        let current = self
            .current_node
            .filter(|node| !node.id.trim().is_empty())
            .ok_or_else(|| AppError::missing_field("currentNode"))?;

        let choice = self
            .choice
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::missing_field("choice"))?;
        let choice: Direction = choice.parse().map_err(|_| AppError::Validation {
            field: "choice".to_string(),
            reason: "must be 'left' or 'right'".to_string(),
        })?;

        let depth = self.depth.unwrap_or(current.depth + 1);

        Ok(NextInput {
            current,
            choice,
            history: self.history.unwrap_or_default(),
            depth,
        })
    }
}

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error returned from a handler, rendered as `{"error": ..}`.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    /// 400 with `Invalid request: {reason}`.
    pub fn invalid(reason: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: format!("Invalid request: {}", reason),
                details: None,
            },
        }
    }

    /// 500 with the underlying message in `details`.
    pub fn generation(err: &AppError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                error: "Server error generating story".to_string(),
                details: Some(err.to_string()),
            },
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match &err {
            AppError::Validation { field, reason } => {
                ApiError::invalid(&format!("{} {}.", field, reason))
            }
            _ => ApiError::generation(&err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "Rejected request body");
        Self {
            status: rejection.status(),
            body: ErrorBody {
                error: format!("Invalid request: {}", rejection.body_text()),
                details: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// `GET /`
pub async fn health() -> &'static str {
    "AdventureSwipe backend is healthy."
}

/// `POST /next`
pub async fn next_node(
    State(state): State<SharedState>,
    payload: Result<Json<NextRequest>, JsonRejection>,
) -> Result<Json<StoryNode>, ApiError> {
    let Json(request) = payload?;
    let input = request.validate()?;

    let node = state
        .orchestrator
        .resolve_choice(input.current, input.choice, input.history, input.depth)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to resolve next node");
            ApiError::from(e)
        })?;

    Ok(Json(node))
}

/// `GET /new-game`
pub async fn new_game(State(state): State<SharedState>) -> Result<Json<StoryNode>, ApiError> {
    let node = state.orchestrator.new_game().await.map_err(|e| {
        error!(error = %e, "Failed to start new game");
        ApiError::from(e)
    })?;

    Ok(Json(node))
}

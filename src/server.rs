use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinError;

use crate::config::RosterConfig;
use crate::data::{RosterInput, RosterReport};
use crate::error::RosterError;
use crate::optimize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// A failed request rendered as an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    Roster(RosterError),
    /// The solve task panicked or was cancelled.
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Roster(
                RosterError::DataIntegrity(_)
                | RosterError::DataValue { .. }
                | RosterError::UnsatisfiableRequirement { .. },
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Roster(RosterError::Infeasible { .. }) => StatusCode::CONFLICT,
            ApiError::Roster(RosterError::Solver { .. } | RosterError::TimeLimit { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Roster(RosterError::InvariantViolation { .. }) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Roster(e) => ErrorBody {
                error: e.kind(),
                message: e.to_string(),
            },
            ApiError::Internal(message) => ErrorBody {
                error: "InternalError",
                message: message.clone(),
            },
        }
    }
}

impl From<RosterError> for ApiError {
    fn from(e: RosterError) -> Self {
        ApiError::Roster(e)
    }
}

impl From<JoinError> for ApiError {
    fn from(e: JoinError) -> Self {
        ApiError::Internal(format!("solve task did not complete: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

async fn solve_handler(
    State(config): State<Arc<RosterConfig>>,
    Json(input): Json<RosterInput>,
) -> Result<Json<RosterReport>, ApiError> {
    // the solver blocks; keep it off the async workers
    let options = config.solver.clone();
    let outcome = tokio::task::spawn_blocking(move || optimize(&input, &options)).await;

    match outcome {
        Ok(Ok(report)) => Ok(Json(report)),
        Ok(Err(e)) => {
            warn!("Roster run failed: {e}");
            Err(e.into())
        }
        Err(join_error) => {
            error!("Solver task did not complete: {join_error}");
            Err(join_error.into())
        }
    }
}

pub fn router(config: Arc<RosterConfig>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/v1/roster/solve", post(solve_handler))
        .with_state(config)
}

pub async fn run_server(config: RosterConfig) -> std::io::Result<()> {
    let addr = config.bind_addr;
    let app = router(Arc::new(config));

    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}

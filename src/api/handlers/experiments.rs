//! Experiment admin handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::ExperimentResponse;
use crate::app_state::AppState;
use crate::domain::ExperimentId;
use crate::error::{EngineError, ErrorResponse};

/// `GET /experiments/:id` — Experiment state with fresh confidence.
///
/// # Errors
///
/// Returns [`EngineError::ExperimentNotFound`] for an unknown experiment.
#[utoipa::path(
    get,
    path = "/api/v1/experiments/{id}",
    tag = "Experiments",
    summary = "Read experiment state",
    description = "Returns variant counters, the confidence computed from them at read time, and any declared winner.",
    params(
        ("id" = uuid::Uuid, Path, description = "Experiment UUID"),
    ),
    responses(
        (status = 200, description = "Experiment state", body = ExperimentResponse),
        (status = 404, description = "Experiment not found", body = ErrorResponse),
    )
)]
pub async fn get_experiment(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let (experiment, confidence) = state
        .engine
        .experiment_state(ExperimentId::from_uuid(id))
        .await?;
    Ok(Json(ExperimentResponse::from_state(&experiment, confidence)))
}

/// `POST /experiments/:id/winner/permanent` — Lock in the winner.
///
/// # Errors
///
/// Returns [`EngineError::ExperimentNotFound`] for an unknown experiment,
/// or [`EngineError::InvalidRule`] when no winner has been declared yet.
#[utoipa::path(
    post,
    path = "/api/v1/experiments/{id}/winner/permanent",
    tag = "Experiments",
    summary = "Make the winner permanent",
    description = "Locks in the auto-declared winner so it can no longer be displaced.",
    params(
        ("id" = uuid::Uuid, Path, description = "Experiment UUID"),
    ),
    responses(
        (status = 200, description = "Winner locked in", body = ExperimentResponse),
        (status = 400, description = "No winner declared yet", body = ErrorResponse),
        (status = 404, description = "Experiment not found", body = ErrorResponse),
    )
)]
pub async fn make_winner_permanent(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let experiment = state
        .engine
        .make_winner_permanent(ExperimentId::from_uuid(id))
        .await?;
    Ok(Json(ExperimentResponse::from(&experiment)))
}

/// `POST /experiments/:id/restart` — Restart with zeroed counters.
///
/// # Errors
///
/// Returns [`EngineError::ExperimentNotFound`] for an unknown experiment.
#[utoipa::path(
    post,
    path = "/api/v1/experiments/{id}/restart",
    tag = "Experiments",
    summary = "Restart an experiment",
    description = "Zeroes all variant counters and clears the declared winner.",
    params(
        ("id" = uuid::Uuid, Path, description = "Experiment UUID"),
    ),
    responses(
        (status = 200, description = "Restarted state", body = ExperimentResponse),
        (status = 404, description = "Experiment not found", body = ErrorResponse),
    )
)]
pub async fn restart_experiment(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let experiment = state
        .engine
        .restart_experiment(ExperimentId::from_uuid(id))
        .await?;
    Ok(Json(ExperimentResponse::from(&experiment)))
}

/// Experiment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/experiments/{id}", get(get_experiment))
        .route("/experiments/{id}/winner/permanent", post(make_winner_permanent))
        .route("/experiments/{id}/restart", post(restart_experiment))
}

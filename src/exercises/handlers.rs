use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::error::AppResult;
use crate::exercises::{
    dto::{LogExerciseRequest, UpdateExerciseRequest},
    repo_types::{Exercise, ExerciseId},
    services,
};
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/exercises", get(list_exercises))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/exercises", post(log_exercise))
        .route(
            "/exercises/:id",
            patch(update_exercise).delete(delete_exercise),
        )
}

#[instrument(skip(state))]
pub async fn list_exercises(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<Exercise>>> {
    Ok(Json(services::list_exercises(&state, user_id).await?))
}

#[instrument(skip(state, body))]
pub async fn log_exercise(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<LogExerciseRequest>,
) -> AppResult<(StatusCode, Json<Exercise>)> {
    let exercise = services::log_exercise(&state, user_id, body).await?;
    Ok((StatusCode::CREATED, Json(exercise)))
}

#[instrument(skip(state, body))]
pub async fn update_exercise(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<ExerciseId>,
    Json(body): Json<UpdateExerciseRequest>,
) -> AppResult<Json<Exercise>> {
    Ok(Json(services::update_exercise(&state, user_id, id, body).await?))
}

#[instrument(skip(state))]
pub async fn delete_exercise(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<ExerciseId>,
) -> AppResult<StatusCode> {
    services::delete_exercise(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

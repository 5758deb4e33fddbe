use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::error::AppResult;
use crate::state::AppState;
use crate::users::{
    repo_types::{Goals, User},
    services,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/users", get(list_users))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/me/goals", put(update_goals))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<User>> {
    Ok(Json(services::get_user(&state, user_id).await?))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(services::list_users(&state).await?))
}

#[instrument(skip(state, goals))]
pub async fn update_goals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(goals): Json<Goals>,
) -> AppResult<Json<User>> {
    Ok(Json(services::update_goals(&state, user_id, goals).await?))
}

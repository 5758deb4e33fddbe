use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::error::AppResult;
use crate::state::AppState;
use crate::streaks::{repo_types::Streak, services};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/streak", get(get_streak))
}

#[instrument(skip(state))]
pub async fn get_streak(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Streak>> {
    Ok(Json(services::get_streak(&state, user_id).await?))
}

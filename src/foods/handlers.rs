use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::error::AppResult;
use crate::foods::{
    dto::{CreateFoodRequest, SearchQuery},
    repo_types::{FoodCandidate, FoodItem},
    services,
};
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/foods/search", get(search))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/foods", post(create))
}

#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Vec<FoodCandidate>>> {
    Ok(Json(services::search_foods(&state, &params.q).await?))
}

#[instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Json(body): Json<CreateFoodRequest>,
) -> AppResult<(StatusCode, Json<FoodItem>)> {
    let food = services::create_food(&state, body).await?;
    Ok((StatusCode::CREATED, Json(food)))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::calendar::Calendar;
use crate::error::AppResult;
use crate::meals::dto::{
    DayQuery, LineItemRemoved, MealWithItems, SaveMealRequest, UpdateQuantityRequest,
};
use crate::meals::repo_types::{LineItemId, MealId};
use crate::meals::services;
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/meals", get(list_meals))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(save_meal))
        .route("/meals/:id", delete(delete_meal))
        .route(
            "/meals/items/:id",
            delete(delete_line_item).patch(update_line_item),
        )
}

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DayQuery>,
) -> AppResult<Json<Vec<MealWithItems>>> {
    let day = match q.date.as_deref() {
        Some(raw) => Calendar::parse_date_key(raw)?,
        None => state.calendar.today(),
    };
    Ok(Json(services::list_meals_for_day(&state, user_id, day).await?))
}

#[instrument(skip(state, body))]
pub async fn save_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<SaveMealRequest>,
) -> AppResult<(StatusCode, Json<MealWithItems>)> {
    let saved = services::save_meal(&state, user_id, body).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<MealId>,
) -> AppResult<StatusCode> {
    services::delete_meal(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn delete_line_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<LineItemId>,
) -> AppResult<Json<LineItemRemoved>> {
    Ok(Json(services::delete_line_item(&state, user_id, id).await?))
}

#[instrument(skip(state, body))]
pub async fn update_line_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<LineItemId>,
    Json(body): Json<UpdateQuantityRequest>,
) -> AppResult<Json<MealWithItems>> {
    let meal = services::update_line_item_quantity(&state, user_id, id, body.quantity).await?;
    Ok(Json(meal))
}

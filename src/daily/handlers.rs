use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::calendar::Calendar;
use crate::daily::{dto::InvalidDayRequest, repo_types::DailyNutrition, services};
use crate::error::AppResult;
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/daily/:date", get(get_daily))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/daily/:date/invalid", put(mark_invalid))
}

#[instrument(skip(state))]
pub async fn get_daily(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
) -> AppResult<Json<DailyNutrition>> {
    let day = Calendar::parse_date_key(&date)?;
    Ok(Json(services::get_daily_nutrition(&state, user_id, day).await?))
}

#[instrument(skip(state, body))]
pub async fn mark_invalid(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
    Json(body): Json<InvalidDayRequest>,
) -> AppResult<Json<DailyNutrition>> {
    let day = Calendar::parse_date_key(&date)?;
    let row = services::mark_day_invalid(&state, user_id, day, body.invalid).await?;
    Ok(Json(row))
}

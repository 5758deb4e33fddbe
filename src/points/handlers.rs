use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::calendar::Calendar;
use crate::error::AppResult;
use crate::points::{repo_types::DailyPoints, services};
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/daily/:date/points", get(get_points))
}

#[instrument(skip(state))]
pub async fn get_points(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
) -> AppResult<Json<DailyPoints>> {
    let day = Calendar::parse_date_key(&date)?;
    Ok(Json(services::get_points(&state, user_id, day).await?))
}

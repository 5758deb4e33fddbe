use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument};

use crate::admin::services::{self, RepairReport};
use crate::auth::extractors::AuthUser;
use crate::error::AppResult;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/repair", post(repair))
}

#[instrument(skip(state))]
pub async fn repair(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<RepairReport>> {
    info!(user_id, "repair requested");
    Ok(Json(services::repair(&state).await?))
}

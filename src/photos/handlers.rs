use axum::{
    extract::{DefaultBodyLimit, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::error::AppResult;
use crate::photos::{
    dto::{AnalyzeRequest, AnalyzeResponse},
    services,
};
use crate::state::AppState;

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/photos/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[instrument(skip(state, body))]
pub async fn analyze(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<AnalyzeRequest>,
) -> AppResult<Json<AnalyzeResponse>> {
    let foods = services::analyze_photo(&state, &body.image).await?;
    Ok(Json(AnalyzeResponse { foods }))
}

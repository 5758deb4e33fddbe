use crate::state::AppState;
use axum::Router;

mod dto;
pub(crate) mod extractors;
pub mod handlers;
mod password;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}

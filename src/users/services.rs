use tracing::info;

use crate::daily::services::recompute_day;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::repo_types::{Goals, User, UserId};

pub async fn get_user(state: &AppState, user_id: UserId) -> AppResult<User> {
    state
        .store
        .find_user(user_id)
        .await?
        .ok_or(AppError::NotFound("user"))
}

/// Both competitors, oldest account first.
pub async fn list_users(state: &AppState) -> AppResult<Vec<User>> {
    state.store.list_users().await
}

/// New goals apply from today on: today's row is recomputed with them, past
/// days keep their snapshot until repaired.
pub async fn update_goals(state: &AppState, user_id: UserId, goals: Goals) -> AppResult<User> {
    goals.validate()?;
    let user = state
        .store
        .update_goals(user_id, goals)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    info!(user_id, calories = goals.calories, "goals updated");
    recompute_day(state, user_id, state.calendar.today()).await?;
    Ok(user)
}

use time::Date;
use tracing::info;

use crate::error::AppResult;
use crate::state::AppState;
use crate::streaks::repo_types::Streak;
use crate::users::repo_types::UserId;

pub async fn get_streak(state: &AppState, user_id: UserId) -> AppResult<Streak> {
    Ok(state
        .store
        .find_streak(user_id)
        .await?
        .unwrap_or_else(|| Streak::empty(user_id)))
}

/// Counts an exercise day into the user's streak.
pub async fn on_exercise_logged(state: &AppState, user_id: UserId, day: Date) -> AppResult<Streak> {
    let current = get_streak(state, user_id).await?;
    let next = current.advance(day);
    if next != current {
        state.store.save_streak(&next).await?;
        info!(
            user_id,
            %day,
            current = next.current,
            longest = next.longest,
            "streak updated"
        );
    }
    Ok(next)
}

/// Re-derives the streak from the full exercise history.
pub async fn rebuild_streak(state: &AppState, user_id: UserId) -> AppResult<Streak> {
    let previous = get_streak(state, user_id).await?;
    let days: Vec<Date> = state
        .store
        .list_exercises(user_id)
        .await?
        .iter()
        .map(|e| state.calendar.date_of(e.performed_at))
        .collect();
    let rebuilt = Streak::rebuild(user_id, days, previous.longest);
    if rebuilt != previous {
        state.store.save_streak(&rebuilt).await?;
        info!(
            user_id,
            current = rebuilt.current,
            longest = rebuilt.longest,
            "streak rebuilt"
        );
    }
    Ok(rebuilt)
}

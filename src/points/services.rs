use time::Date;
use tracing::{error, info};

use crate::error::AppResult;
use crate::points::repo_types::{DailyPoints, PointCategory};
use crate::state::AppState;
use crate::users::repo_types::UserId;

fn checked(row: DailyPoints) -> AppResult<DailyPoints> {
    if let Err(e) = row.check_invariant() {
        error!(user_id = row.user_id, day = %row.day, error = %e, "points invariant broken");
        return Err(e);
    }
    Ok(row)
}

/// Brings a single-valued category to its desired state.
///
/// Awards `point_value` only when the category is currently empty and revokes
/// whatever it holds when it should be empty; any other combination is left
/// alone, so repeated calls never award twice.
pub async fn reconcile_category(
    state: &AppState,
    user_id: UserId,
    day: Date,
    category: PointCategory,
    should_have_points: bool,
    point_value: i32,
) -> AppResult<DailyPoints> {
    let current = state
        .store
        .find_points(user_id, day)
        .await?
        .map(|p| p.category(category))
        .unwrap_or(0);

    let row = match (current != 0, should_have_points) {
        (true, false) => {
            info!(user_id, %day, ?category, revoked = current, "points revoked");
            state
                .store
                .set_category_points(user_id, day, category, 0)
                .await?
        }
        (false, true) => {
            info!(user_id, %day, ?category, awarded = point_value, "points awarded");
            state
                .store
                .set_category_points(user_id, day, category, point_value)
                .await?
        }
        _ => match state.store.find_points(user_id, day).await? {
            Some(row) => row,
            None => return Ok(DailyPoints::empty(user_id, day)),
        },
    };
    checked(row)
}

/// Exercise points accumulate: every session adds to the category and the total.
pub async fn award_exercise_points(
    state: &AppState,
    user_id: UserId,
    day: Date,
    points: i32,
) -> AppResult<DailyPoints> {
    let row = state
        .store
        .add_category_points(user_id, day, PointCategory::Exercise, points)
        .await?;
    info!(user_id, %day, points, total = row.total_points, "exercise points added");
    checked(row)
}

pub async fn get_points(state: &AppState, user_id: UserId, day: Date) -> AppResult<DailyPoints> {
    Ok(state
        .store
        .find_points(user_id, day)
        .await?
        .unwrap_or_else(|| DailyPoints::empty(user_id, day)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use time::macros::date;

    const DAY: Date = date!(2026-03-10);

    #[tokio::test]
    async fn reconcile_awards_once() {
        let state = AppState::fake();
        for _ in 0..3 {
            let row = reconcile_category(&state, 1, DAY, PointCategory::CalorieGoal, true, 2)
                .await
                .unwrap();
            assert_eq!((row.calorie_points, row.total_points), (2, 2));
        }
    }

    #[tokio::test]
    async fn reconcile_revokes_and_keeps_exercise_points() {
        let state = AppState::fake();
        award_exercise_points(&state, 1, DAY, 3).await.unwrap();
        reconcile_category(&state, 1, DAY, PointCategory::CalorieGoal, true, 2)
            .await
            .unwrap();

        let row = reconcile_category(&state, 1, DAY, PointCategory::CalorieGoal, false, 2)
            .await
            .unwrap();
        assert_eq!(
            (row.exercise_points, row.calorie_points, row.total_points),
            (3, 0, 3)
        );

        let again = reconcile_category(&state, 1, DAY, PointCategory::CalorieGoal, false, 2)
            .await
            .unwrap();
        assert_eq!(again, row);
    }

    #[tokio::test]
    async fn reconcile_without_row_and_nothing_to_do_writes_nothing() {
        let state = AppState::fake();
        let row = reconcile_category(&state, 1, DAY, PointCategory::CalorieGoal, false, 2)
            .await
            .unwrap();
        assert_eq!(row, DailyPoints::empty(1, DAY));
        assert!(state.store.find_points(1, DAY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn exercise_points_accumulate() {
        let state = AppState::fake();
        award_exercise_points(&state, 1, DAY, 2).await.unwrap();
        let row = award_exercise_points(&state, 1, DAY, 1).await.unwrap();
        assert_eq!((row.exercise_points, row.total_points), (3, 3));
        assert_eq!(get_points(&state, 1, DAY).await.unwrap(), row);
    }
}

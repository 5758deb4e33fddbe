//! Daily reconciler: keeps `daily_nutrition` equal to the sum of the day's
//! meals and the calorie-goal points in line with the goal-met flag.

use time::Date;
use tracing::{debug, info};

use crate::daily::repo_types::DailyNutrition;
use crate::error::{AppError, AppResult};
use crate::nutrients::Nutrients;
use crate::points::{repo_types::PointCategory, services::reconcile_category};
use crate::state::AppState;
use crate::users::repo_types::{User, UserId};

async fn load_user(state: &AppState, user_id: UserId) -> AppResult<User> {
    state
        .store
        .find_user(user_id)
        .await?
        .ok_or(AppError::NotFound("user"))
}

/// Sum of every meal the user ate within the civil day.
pub async fn sum_meals_for_day(
    state: &AppState,
    user_id: UserId,
    day: Date,
) -> AppResult<Nutrients> {
    let (start, end) = state.calendar.day_bounds(day);
    let meals = state.store.meals_between(user_id, start, end).await?;
    Ok(meals.iter().map(|m| m.totals).sum())
}

/// Full recompute from the meals. Refreshes the goal snapshot to the user's
/// current goal. Running it twice without meal changes is a no-op.
pub async fn recompute_day(
    state: &AppState,
    user_id: UserId,
    day: Date,
) -> AppResult<DailyNutrition> {
    let user = load_user(state, user_id).await?;
    let (start, end) = state.calendar.day_bounds(day);
    let row = state
        .store
        .resum_daily_totals(user_id, day, start, end, user.goals.calories)
        .await?;
    debug!(user_id, %day, calories = row.totals.calories, "day recomputed");
    settle_goal(state, row).await
}

/// Cheap path for a freshly saved meal: adds its totals in place, keeping the
/// stored goal snapshot, then runs the same read-and-flag step as a recompute.
pub async fn apply_meal_increment(
    state: &AppState,
    user_id: UserId,
    day: Date,
    delta: Nutrients,
) -> AppResult<DailyNutrition> {
    let user = load_user(state, user_id).await?;
    state
        .store
        .increment_daily_totals(user_id, day, delta, user.goals.calories)
        .await?;
    // re-read: another request may have incremented the same row in between
    let row = state
        .store
        .find_daily(user_id, day)
        .await?
        .ok_or(AppError::NotFound("daily nutrition"))?;
    settle_goal(state, row).await
}

/// Evaluates goal-met on a stored row, persists a flip and reconciles the
/// calorie-goal points with it.
async fn settle_goal(state: &AppState, mut row: DailyNutrition) -> AppResult<DailyNutrition> {
    let met = row.evaluate_goal();
    if met != row.goal_met {
        info!(
            user_id = row.user_id,
            day = %row.day,
            calories = row.totals.calories,
            goal = row.goal_calories,
            goal_met = met,
            "goal status changed"
        );
        state.store.set_goal_met(row.user_id, row.day, met).await?;
        row.goal_met = met;
    }
    reconcile_category(
        state,
        row.user_id,
        row.day,
        PointCategory::CalorieGoal,
        met,
        state.config.scoring.calorie_goal_points,
    )
    .await?;
    Ok(row)
}

/// Toggles the invalid override and re-evaluates the day. Totals are kept.
pub async fn mark_day_invalid(
    state: &AppState,
    user_id: UserId,
    day: Date,
    invalid: bool,
) -> AppResult<DailyNutrition> {
    let user = load_user(state, user_id).await?;
    state
        .store
        .set_daily_invalid(user_id, day, invalid, user.goals.calories)
        .await?;
    info!(user_id, %day, invalid, "invalid flag set");
    recompute_day(state, user_id, day).await
}

/// Read path. A day without a row reads as empty against the current goal.
pub async fn get_daily_nutrition(
    state: &AppState,
    user_id: UserId,
    day: Date,
) -> AppResult<DailyNutrition> {
    if let Some(row) = state.store.find_daily(user_id, day).await? {
        return Ok(row);
    }
    let user = load_user(state, user_id).await?;
    Ok(DailyNutrition::empty(user_id, day, user.goals.calories))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::meals::dto::{FoodSource, LineItemInput, SaveMealRequest};
    use crate::meals::repo_types::MealSlot;
    use crate::state::AppState;
    use crate::users::repo_types::{Goals, NewUser, UserColor, UserId};

    pub async fn competitor(state: &AppState, color: UserColor, calorie_goal: f64) -> UserId {
        state
            .store
            .create_user(NewUser {
                name: format!("{color:?}"),
                email: format!("{}@duofit.test", color.as_str()),
                password_hash: "x".into(),
                color,
                avatar: None,
                goals: Goals {
                    calories: calorie_goal,
                    protein: 150.0,
                    carbs: 250.0,
                    fat: 65.0,
                },
            })
            .await
            .unwrap()
            .id
    }

    /// One-line meal of `calories` kcal, logged as a scaled food in units.
    pub fn meal_of(slot: MealSlot, calories: f64, date: Option<&str>) -> SaveMealRequest {
        SaveMealRequest {
            slot,
            date: date.map(str::to_string),
            items: vec![LineItemInput {
                quantity: 1.0,
                unit: "unit".into(),
                food: FoodSource::Scaled {
                    name: format!("{} kcal plate", calories),
                    calories,
                    protein: 10.0,
                    carbs: 20.0,
                    fat: 5.0,
                },
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{competitor, meal_of};
    use super::*;
    use crate::calendar::test_support::fixed_calendar;
    use crate::meals::repo_types::MealSlot;
    use crate::meals::services::{delete_meal, save_meal};
    use crate::points::services::get_points;
    use crate::users::repo_types::UserColor;
    use time::macros::date;

    const TODAY: Date = date!(2026-03-10);

    fn state() -> AppState {
        AppState::fake().with_calendar(fixed_calendar())
    }

    #[tokio::test]
    async fn recompute_is_idempotent() {
        let state = state();
        let user = competitor(&state, UserColor::Yellow, 2000.0).await;
        save_meal(&state, user, meal_of(MealSlot::Lunch, 800.0, None))
            .await
            .unwrap();

        let first = recompute_day(&state, user, TODAY).await.unwrap();
        let points_first = get_points(&state, user, TODAY).await.unwrap();
        let second = recompute_day(&state, user, TODAY).await.unwrap();
        let points_second = get_points(&state, user, TODAY).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(points_first, points_second);
        assert_eq!(points_second.calorie_points, 2);
    }

    #[tokio::test]
    async fn end_to_end_goal_met_then_exceeded() {
        let state = state();
        let user = competitor(&state, UserColor::Yellow, 2000.0).await;

        save_meal(&state, user, meal_of(MealSlot::Breakfast, 500.0, None))
            .await
            .unwrap();
        save_meal(&state, user, meal_of(MealSlot::Lunch, 700.0, None))
            .await
            .unwrap();
        save_meal(&state, user, meal_of(MealSlot::Dinner, 750.0, None))
            .await
            .unwrap();

        let day = get_daily_nutrition(&state, user, TODAY).await.unwrap();
        assert_eq!(day.totals.calories, 1950.0);
        assert!(day.goal_met);
        let points = get_points(&state, user, TODAY).await.unwrap();
        assert_eq!((points.calorie_points, points.total_points), (2, 2));

        save_meal(&state, user, meal_of(MealSlot::Snack, 200.0, None))
            .await
            .unwrap();
        let day = get_daily_nutrition(&state, user, TODAY).await.unwrap();
        assert_eq!(day.totals.calories, 2150.0);
        assert!(!day.goal_met);
        let points = get_points(&state, user, TODAY).await.unwrap();
        assert_eq!((points.calorie_points, points.total_points), (0, 0));
    }

    #[tokio::test]
    async fn invalid_day_revokes_and_restores_once() {
        let state = state();
        let user = competitor(&state, UserColor::Blue, 2000.0).await;
        save_meal(&state, user, meal_of(MealSlot::Lunch, 1500.0, None))
            .await
            .unwrap();

        let day = mark_day_invalid(&state, user, TODAY, true).await.unwrap();
        assert!(day.invalid && !day.goal_met);
        assert_eq!(day.totals.calories, 1500.0);
        assert_eq!(get_points(&state, user, TODAY).await.unwrap().total_points, 0);

        let day = mark_day_invalid(&state, user, TODAY, false).await.unwrap();
        assert!(!day.invalid && day.goal_met);
        mark_day_invalid(&state, user, TODAY, false).await.unwrap();
        let points = get_points(&state, user, TODAY).await.unwrap();
        assert_eq!((points.calorie_points, points.total_points), (2, 2));
    }

    #[tokio::test]
    async fn deleting_only_meal_resets_day() {
        let state = state();
        let user = competitor(&state, UserColor::Green, 2000.0).await;
        let saved = save_meal(&state, user, meal_of(MealSlot::Lunch, 600.0, None))
            .await
            .unwrap();
        assert_eq!(get_points(&state, user, TODAY).await.unwrap().calorie_points, 2);

        delete_meal(&state, user, saved.meal.id).await.unwrap();

        let day = get_daily_nutrition(&state, user, TODAY).await.unwrap();
        assert_eq!(day.totals, Nutrients::ZERO);
        assert!(!day.goal_met);
        let points = get_points(&state, user, TODAY).await.unwrap();
        assert_eq!((points.calorie_points, points.total_points), (0, 0));
    }

    #[tokio::test]
    async fn incremental_path_matches_full_recompute() {
        let mut config = crate::config::AppConfig::for_tests();
        config.scoring.incremental_meal_saves = true;
        let state = state().with_config(config);
        let user = competitor(&state, UserColor::Pink, 1000.0).await;

        save_meal(&state, user, meal_of(MealSlot::Breakfast, 400.0, None))
            .await
            .unwrap();
        let day = get_daily_nutrition(&state, user, TODAY).await.unwrap();
        assert!(day.goal_met);
        assert_eq!(get_points(&state, user, TODAY).await.unwrap().calorie_points, 2);

        save_meal(&state, user, meal_of(MealSlot::Dinner, 700.0, None))
            .await
            .unwrap();
        let incremental = get_daily_nutrition(&state, user, TODAY).await.unwrap();
        assert_eq!(incremental.totals.calories, 1100.0);
        assert!(!incremental.goal_met);
        assert_eq!(get_points(&state, user, TODAY).await.unwrap().total_points, 0);

        let full = recompute_day(&state, user, TODAY).await.unwrap();
        assert!(full.totals.approx_eq(&incremental.totals));
        assert_eq!(full.goal_met, incremental.goal_met);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_on_one_day_are_all_counted() {
        let state = state();
        let user = competitor(&state, UserColor::Green, 5000.0).await;

        let saves: Vec<_> = (0..16)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move {
                    save_meal(&state, user, meal_of(MealSlot::Snack, 100.0, None)).await
                })
            })
            .collect();
        for save in saves {
            save.await.unwrap().unwrap();
        }

        let day = get_daily_nutrition(&state, user, TODAY).await.unwrap();
        assert_eq!(day.totals.calories, 1600.0);
        assert!(day.totals.approx_eq(&sum_meals_for_day(&state, user, TODAY).await.unwrap()));
        assert!(day.goal_met);
        let points = get_points(&state, user, TODAY).await.unwrap();
        assert_eq!((points.calorie_points, points.total_points), (2, 2));
    }

    #[tokio::test]
    async fn goal_boundary_is_inclusive() {
        let state = state();
        let user = competitor(&state, UserColor::Yellow, 2000.0).await;
        save_meal(&state, user, meal_of(MealSlot::Lunch, 2000.0, None))
            .await
            .unwrap();
        assert!(get_daily_nutrition(&state, user, TODAY).await.unwrap().goal_met);

        save_meal(&state, user, meal_of(MealSlot::Snack, 1.0, None))
            .await
            .unwrap();
        assert!(!get_daily_nutrition(&state, user, TODAY).await.unwrap().goal_met);
    }

    #[tokio::test]
    async fn empty_day_reads_against_current_goal() {
        let state = state();
        let user = competitor(&state, UserColor::Blue, 1800.0).await;
        let day = get_daily_nutrition(&state, user, date!(2026-01-01)).await.unwrap();
        assert_eq!(day.goal_calories, 1800.0);
        assert!(!day.goal_met);
        assert!(state.store.find_daily(user, date!(2026-01-01)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recompute_of_empty_day_awards_nothing() {
        let state = state();
        let user = competitor(&state, UserColor::Blue, 1800.0).await;
        let day = recompute_day(&state, user, TODAY).await.unwrap();
        assert_eq!(day.totals.calories, 0.0);
        assert!(!day.goal_met);
        assert_eq!(get_points(&state, user, TODAY).await.unwrap().total_points, 0);
    }

    #[tokio::test]
    async fn backdated_meal_lands_on_its_day() {
        let state = state();
        let user = competitor(&state, UserColor::Yellow, 2000.0).await;
        save_meal(&state, user, meal_of(MealSlot::Dinner, 900.0, Some("2026-03-08")))
            .await
            .unwrap();
        let past = get_daily_nutrition(&state, user, date!(2026-03-08)).await.unwrap();
        assert_eq!(past.totals.calories, 900.0);
        let today = get_daily_nutrition(&state, user, TODAY).await.unwrap();
        assert_eq!(today.totals.calories, 0.0);
    }
}

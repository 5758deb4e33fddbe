//! Consistency repair: re-derives every day's aggregates and each streak from
//! the source records (meals and exercises) and rewrites whatever drifted.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use time::Date;
use tracing::{info, warn};

use crate::daily::repo_types::goal_met;
use crate::daily::services::sum_meals_for_day;
use crate::error::AppResult;
use crate::nutrients::Nutrients;
use crate::state::AppState;
use crate::streaks::services::{get_streak, rebuild_streak};
use crate::users::repo_types::User;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub users: usize,
    pub days_checked: usize,
    pub nutrition_fixed: usize,
    pub points_fixed: usize,
    pub streaks_fixed: usize,
}

/// Walks both competitors. Running it on a consistent store changes nothing.
pub async fn repair(state: &AppState) -> AppResult<RepairReport> {
    let mut report = RepairReport::default();
    for user in state.store.list_users().await? {
        repair_user(state, &user, &mut report).await?;
        report.users += 1;
    }
    info!(
        users = report.users,
        days = report.days_checked,
        nutrition_fixed = report.nutrition_fixed,
        points_fixed = report.points_fixed,
        streaks_fixed = report.streaks_fixed,
        "repair finished"
    );
    Ok(report)
}

async fn repair_user(state: &AppState, user: &User, report: &mut RepairReport) -> AppResult<()> {
    let store = &state.store;
    let mut days: BTreeSet<Date> = BTreeSet::new();

    for meal in store.list_meals(user.id).await? {
        days.insert(state.calendar.date_of(meal.eaten_at));
    }
    let mut exercise_points: BTreeMap<Date, i32> = BTreeMap::new();
    for exercise in store.list_exercises(user.id).await? {
        let day = state.calendar.date_of(exercise.performed_at);
        *exercise_points.entry(day).or_default() += exercise.points;
        days.insert(day);
    }
    days.extend(store.list_daily(user.id).await?.iter().map(|d| d.day));
    days.extend(store.list_points(user.id).await?.iter().map(|p| p.day));

    let goal = user.goals.calories;
    let calorie_value = state.config.scoring.calorie_goal_points;

    for day in days {
        report.days_checked += 1;

        let totals = sum_meals_for_day(state, user.id, day).await?;
        let existing = store.find_daily(user.id, day).await?;
        let invalid = existing.as_ref().map(|d| d.invalid).unwrap_or(false);
        let met = goal_met(invalid, totals.calories, goal);

        let nutrition_ok = match &existing {
            Some(d) => d.totals.approx_eq(&totals) && d.goal_calories == goal && d.goal_met == met,
            None => totals.approx_eq(&Nutrients::ZERO),
        };
        if !nutrition_ok {
            warn!(user_id = user.id, %day, calories = totals.calories, "daily nutrition drifted");
            store.write_daily_totals(user.id, day, totals, goal).await?;
            store.set_goal_met(user.id, day, met).await?;
            report.nutrition_fixed += 1;
        }

        let exercise = exercise_points.get(&day).copied().unwrap_or(0);
        let calorie = if met { calorie_value } else { 0 };
        let points_ok = match store.find_points(user.id, day).await? {
            Some(p) => {
                p.exercise_points == exercise
                    && p.calorie_points == calorie
                    && p.total_points == exercise + calorie
            }
            None => exercise == 0 && calorie == 0,
        };
        if !points_ok {
            warn!(user_id = user.id, %day, exercise, calorie, "daily points drifted");
            store.reset_points(user.id, day, exercise, calorie).await?;
            report.points_fixed += 1;
        }
    }

    let before = get_streak(state, user.id).await?;
    let after = rebuild_streak(state, user.id).await?;
    if before != after {
        report.streaks_fixed += 1;
    }
    Ok(())
}

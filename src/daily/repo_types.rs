use serde::{Deserialize, Serialize};
use time::Date;

use crate::nutrients::Nutrients;
use crate::users::repo_types::UserId;

/// One row per user per civil day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyNutrition {
    pub user_id: UserId,
    pub day: Date,
    pub totals: Nutrients,
    pub goal_calories: f64,
    pub goal_met: bool,
    pub invalid: bool,
}

impl DailyNutrition {
    /// Empty day for a user who has not logged anything yet.
    pub fn empty(user_id: UserId, day: Date, goal_calories: f64) -> Self {
        Self {
            user_id,
            day,
            totals: Nutrients::ZERO,
            goal_calories,
            goal_met: false,
            invalid: false,
        }
    }

    /// Deficit goal: something was eaten, and no more than the goal.
    pub fn evaluate_goal(&self) -> bool {
        goal_met(self.invalid, self.totals.calories, self.goal_calories)
    }
}

pub fn goal_met(invalid: bool, calories: f64, goal_calories: f64) -> bool {
    !invalid && calories > 0.0 && calories <= goal_calories
}

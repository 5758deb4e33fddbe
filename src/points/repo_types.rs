use serde::{Deserialize, Serialize};
use time::Date;

use crate::error::AppError;
use crate::users::repo_types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointCategory {
    Exercise,
    CalorieGoal,
}

impl PointCategory {
    /// Column holding this category in `daily_points`.
    pub fn column(self) -> &'static str {
        match self {
            PointCategory::Exercise => "exercise_points",
            PointCategory::CalorieGoal => "calorie_points",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPoints {
    pub user_id: UserId,
    pub day: Date,
    pub exercise_points: i32,
    pub calorie_points: i32,
    pub total_points: i32,
}

impl DailyPoints {
    pub fn empty(user_id: UserId, day: Date) -> Self {
        Self {
            user_id,
            day,
            exercise_points: 0,
            calorie_points: 0,
            total_points: 0,
        }
    }

    pub fn category(&self, category: PointCategory) -> i32 {
        match category {
            PointCategory::Exercise => self.exercise_points,
            PointCategory::CalorieGoal => self.calorie_points,
        }
    }

    pub fn category_mut(&mut self, category: PointCategory) -> &mut i32 {
        match category {
            PointCategory::Exercise => &mut self.exercise_points,
            PointCategory::CalorieGoal => &mut self.calorie_points,
        }
    }

    pub fn category_sum(&self) -> i32 {
        self.exercise_points + self.calorie_points
    }

    pub fn check_invariant(&self) -> Result<(), AppError> {
        if self.total_points != self.category_sum() {
            return Err(AppError::ConsistencyViolation(format!(
                "points total {} differs from category sum {} for user {} on {}",
                self.total_points,
                self.category_sum(),
                self.user_id,
                self.day
            )));
        }
        Ok(())
    }
}

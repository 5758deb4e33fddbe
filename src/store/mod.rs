//! Persistence seam. Services only ever talk to `dyn Store`; Postgres backs
//! production and the in-memory store backs tests and `AppState::fake()`.
//!
//! Aggregate writes (`increment_daily_totals`, `add_category_points`,
//! `set_category_points`) must be atomic per `(user, day)` row: implementations
//! apply them as single deltas, never as a read-modify-write in the caller.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use time::{Date, OffsetDateTime};

use crate::daily::repo_types::DailyNutrition;
use crate::error::AppResult;
use crate::exercises::repo_types::{Exercise, ExerciseChanges, ExerciseId, NewExercise};
use crate::foods::repo_types::{FoodId, FoodItem, NewFood};
use crate::meals::repo_types::{LineItemId, Meal, MealId, MealLineItem, NewMeal};
use crate::nutrients::Nutrients;
use crate::points::repo_types::{DailyPoints, PointCategory};
use crate::streaks::repo_types::Streak;
use crate::users::repo_types::{Goals, NewUser, User, UserId};

#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    // ---- users ----
    async fn create_user(&self, new: NewUser) -> AppResult<User>;
    async fn find_user(&self, id: UserId) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn update_goals(&self, id: UserId, goals: Goals) -> AppResult<Option<User>>;

    // ---- foods ----
    async fn create_food(&self, new: NewFood) -> AppResult<FoodItem>;
    async fn find_foods(&self, ids: &[FoodId]) -> AppResult<Vec<FoodItem>>;
    /// Case-insensitive substring match on the name.
    async fn search_foods(&self, query: &str, limit: i64) -> AppResult<Vec<FoodItem>>;

    // ---- meals ----
    /// Inserts the meal, the inline foods of its lines and the lines
    /// themselves atomically.
    async fn insert_meal(&self, new: NewMeal) -> AppResult<(Meal, Vec<MealLineItem>)>;
    async fn find_meal(&self, id: MealId) -> AppResult<Option<Meal>>;
    async fn list_line_items(&self, meal_id: MealId) -> AppResult<Vec<MealLineItem>>;
    async fn find_line_item(&self, id: LineItemId) -> AppResult<Option<MealLineItem>>;
    async fn update_line_item(
        &self,
        id: LineItemId,
        quantity: f64,
        totals: Nutrients,
    ) -> AppResult<()>;
    async fn delete_line_item(&self, id: LineItemId) -> AppResult<bool>;
    async fn set_meal_totals(&self, id: MealId, totals: Nutrients) -> AppResult<()>;
    /// Deletes the meal and, by cascade, its line items.
    async fn delete_meal(&self, id: MealId) -> AppResult<bool>;
    /// Meals with `start <= eaten_at < end`, oldest first.
    async fn meals_between(
        &self,
        user_id: UserId,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> AppResult<Vec<Meal>>;
    async fn list_meals(&self, user_id: UserId) -> AppResult<Vec<Meal>>;

    // ---- daily nutrition ----
    async fn find_daily(&self, user_id: UserId, day: Date) -> AppResult<Option<DailyNutrition>>;
    async fn list_daily(&self, user_id: UserId) -> AppResult<Vec<DailyNutrition>>;
    /// Upsert overwriting totals and goal snapshot; the invalid flag is kept.
    async fn write_daily_totals(
        &self,
        user_id: UserId,
        day: Date,
        totals: Nutrients,
        goal_calories: f64,
    ) -> AppResult<DailyNutrition>;
    /// Upsert whose totals are summed from the meals with
    /// `start <= eaten_at < end` inside the write itself, serialised per
    /// `(user, day)`, so a concurrent meal change can never be overwritten by
    /// an older sum. Refreshes the goal snapshot; the invalid flag is kept.
    async fn resum_daily_totals(
        &self,
        user_id: UserId,
        day: Date,
        start: OffsetDateTime,
        end: OffsetDateTime,
        goal_calories: f64,
    ) -> AppResult<DailyNutrition>;
    /// Upsert adding `delta` in place; `goal_if_new` is only used when the row
    /// does not exist yet, an existing goal snapshot is preserved.
    async fn increment_daily_totals(
        &self,
        user_id: UserId,
        day: Date,
        delta: Nutrients,
        goal_if_new: f64,
    ) -> AppResult<DailyNutrition>;
    async fn set_daily_invalid(
        &self,
        user_id: UserId,
        day: Date,
        invalid: bool,
        goal_if_new: f64,
    ) -> AppResult<DailyNutrition>;
    async fn set_goal_met(&self, user_id: UserId, day: Date, goal_met: bool) -> AppResult<()>;

    // ---- points ----
    async fn find_points(&self, user_id: UserId, day: Date) -> AppResult<Option<DailyPoints>>;
    async fn list_points(&self, user_id: UserId) -> AppResult<Vec<DailyPoints>>;
    /// Adds `delta` to the category and to the total.
    async fn add_category_points(
        &self,
        user_id: UserId,
        day: Date,
        category: PointCategory,
        delta: i32,
    ) -> AppResult<DailyPoints>;
    /// Sets the category to `value`, moving the total by the difference.
    async fn set_category_points(
        &self,
        user_id: UserId,
        day: Date,
        category: PointCategory,
        value: i32,
    ) -> AppResult<DailyPoints>;
    /// Overwrites both categories and sets the total to their sum.
    async fn reset_points(
        &self,
        user_id: UserId,
        day: Date,
        exercise_points: i32,
        calorie_points: i32,
    ) -> AppResult<DailyPoints>;

    // ---- exercises ----
    async fn insert_exercise(&self, new: NewExercise) -> AppResult<Exercise>;
    async fn find_exercise(&self, id: ExerciseId) -> AppResult<Option<Exercise>>;
    /// Returns the updated row with the points it held right before this
    /// write; concurrent edits each see the value the other left behind.
    async fn update_exercise(
        &self,
        id: ExerciseId,
        changes: ExerciseChanges,
    ) -> AppResult<Option<(Exercise, i32)>>;
    /// Returns the removed row, or `None` when nothing was deleted.
    async fn delete_exercise(&self, id: ExerciseId) -> AppResult<Option<Exercise>>;
    /// Newest first.
    async fn list_exercises(&self, user_id: UserId) -> AppResult<Vec<Exercise>>;

    // ---- streaks ----
    async fn find_streak(&self, user_id: UserId) -> AppResult<Option<Streak>>;
    async fn save_streak(&self, streak: &Streak) -> AppResult<()>;
}

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;

use super::Store;
use crate::daily::repo_types::DailyNutrition;
use crate::error::{AppError, AppResult};
use crate::exercises::repo_types::{Exercise, ExerciseChanges, ExerciseId, NewExercise};
use crate::foods::repo_types::{FoodId, FoodItem, NewFood};
use crate::meals::repo_types::{LineFood, LineItemId, Meal, MealId, MealLineItem, NewMeal};
use crate::nutrients::Nutrients;
use crate::points::repo_types::{DailyPoints, PointCategory};
use crate::streaks::repo_types::Streak;
use crate::users::repo_types::{Goals, NewUser, User, UserId, MAX_COMPETITORS};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<UserId, User>,
    foods: BTreeMap<FoodId, FoodItem>,
    meals: BTreeMap<MealId, Meal>,
    items: BTreeMap<LineItemId, MealLineItem>,
    daily: HashMap<(UserId, Date), DailyNutrition>,
    points: HashMap<(UserId, Date), DailyPoints>,
    exercises: BTreeMap<ExerciseId, Exercise>,
    streaks: HashMap<UserId, Streak>,
}

impl Tables {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn points_row(&mut self, user_id: UserId, day: Date) -> &mut DailyPoints {
        self.points
            .entry((user_id, day))
            .or_insert_with(|| DailyPoints::empty(user_id, day))
    }
}

/// Single-process store. One lock guards every table, so each call is atomic
/// the same way a single SQL statement is.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, new: NewUser) -> AppResult<User> {
        let mut t = self.tables.lock().await;
        if t.users.len() >= MAX_COMPETITORS {
            return Err(AppError::Conflict("both competitors are already registered".into()));
        }
        if t.users.values().any(|u| u.email == new.email) {
            return Err(AppError::Conflict("email already registered".into()));
        }
        if t.users.values().any(|u| u.color == new.color) {
            return Err(AppError::Conflict("color already taken".into()));
        }
        let user = User {
            id: t.id(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            color: new.color,
            avatar: new.avatar,
            goals: new.goals,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.tables.lock().await.users.values().cloned().collect())
    }

    async fn update_goals(&self, id: UserId, goals: Goals) -> AppResult<Option<User>> {
        let mut t = self.tables.lock().await;
        Ok(t.users.get_mut(&id).map(|u| {
            u.goals = goals;
            u.clone()
        }))
    }

    async fn create_food(&self, new: NewFood) -> AppResult<FoodItem> {
        let mut t = self.tables.lock().await;
        let food = FoodItem {
            id: t.id(),
            name: new.name,
            per_reference: new.per_reference,
        };
        t.foods.insert(food.id, food.clone());
        Ok(food)
    }

    async fn find_foods(&self, ids: &[FoodId]) -> AppResult<Vec<FoodItem>> {
        let t = self.tables.lock().await;
        Ok(ids.iter().filter_map(|id| t.foods.get(id).cloned()).collect())
    }

    async fn search_foods(&self, query: &str, limit: i64) -> AppResult<Vec<FoodItem>> {
        let needle = query.to_lowercase();
        let t = self.tables.lock().await;
        let mut hits: Vec<FoodItem> = t
            .foods
            .values()
            .filter(|f| f.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.name.len().cmp(&b.name.len()).then(a.id.cmp(&b.id)));
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }

    async fn insert_meal(&self, new: NewMeal) -> AppResult<(Meal, Vec<MealLineItem>)> {
        let mut t = self.tables.lock().await;
        let meal = Meal {
            id: t.id(),
            user_id: new.user_id,
            slot: new.slot,
            eaten_at: new.eaten_at,
            totals: new.totals,
        };
        let mut items = Vec::with_capacity(new.items.len());
        for item in new.items {
            let food_id = match item.food {
                LineFood::Catalog(id) => id,
                LineFood::Inline(food) => {
                    let food = FoodItem {
                        id: t.id(),
                        name: food.name,
                        per_reference: food.per_reference,
                    };
                    t.foods.insert(food.id, food.clone());
                    food.id
                }
            };
            let row = MealLineItem {
                id: t.id(),
                meal_id: meal.id,
                food_id,
                quantity: item.quantity,
                unit: item.unit,
                totals: item.totals,
            };
            t.items.insert(row.id, row.clone());
            items.push(row);
        }
        t.meals.insert(meal.id, meal.clone());
        Ok((meal, items))
    }

    async fn find_meal(&self, id: MealId) -> AppResult<Option<Meal>> {
        Ok(self.tables.lock().await.meals.get(&id).cloned())
    }

    async fn list_line_items(&self, meal_id: MealId) -> AppResult<Vec<MealLineItem>> {
        let t = self.tables.lock().await;
        Ok(t.items
            .values()
            .filter(|i| i.meal_id == meal_id)
            .cloned()
            .collect())
    }

    async fn find_line_item(&self, id: LineItemId) -> AppResult<Option<MealLineItem>> {
        Ok(self.tables.lock().await.items.get(&id).cloned())
    }

    async fn update_line_item(
        &self,
        id: LineItemId,
        quantity: f64,
        totals: Nutrients,
    ) -> AppResult<()> {
        let mut t = self.tables.lock().await;
        if let Some(item) = t.items.get_mut(&id) {
            item.quantity = quantity;
            item.totals = totals;
        }
        Ok(())
    }

    async fn delete_line_item(&self, id: LineItemId) -> AppResult<bool> {
        Ok(self.tables.lock().await.items.remove(&id).is_some())
    }

    async fn set_meal_totals(&self, id: MealId, totals: Nutrients) -> AppResult<()> {
        let mut t = self.tables.lock().await;
        if let Some(meal) = t.meals.get_mut(&id) {
            meal.totals = totals;
        }
        Ok(())
    }

    async fn delete_meal(&self, id: MealId) -> AppResult<bool> {
        let mut t = self.tables.lock().await;
        let removed = t.meals.remove(&id).is_some();
        if removed {
            t.items.retain(|_, item| item.meal_id != id);
        }
        Ok(removed)
    }

    async fn meals_between(
        &self,
        user_id: UserId,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> AppResult<Vec<Meal>> {
        let t = self.tables.lock().await;
        let mut meals: Vec<Meal> = t
            .meals
            .values()
            .filter(|m| m.user_id == user_id && m.eaten_at >= start && m.eaten_at < end)
            .cloned()
            .collect();
        meals.sort_by(|a, b| a.eaten_at.cmp(&b.eaten_at).then(a.id.cmp(&b.id)));
        Ok(meals)
    }

    async fn list_meals(&self, user_id: UserId) -> AppResult<Vec<Meal>> {
        let t = self.tables.lock().await;
        let mut meals: Vec<Meal> = t
            .meals
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        meals.sort_by(|a, b| a.eaten_at.cmp(&b.eaten_at).then(a.id.cmp(&b.id)));
        Ok(meals)
    }

    async fn find_daily(&self, user_id: UserId, day: Date) -> AppResult<Option<DailyNutrition>> {
        Ok(self.tables.lock().await.daily.get(&(user_id, day)).cloned())
    }

    async fn list_daily(&self, user_id: UserId) -> AppResult<Vec<DailyNutrition>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<DailyNutrition> = t
            .daily
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|d| d.day);
        Ok(rows)
    }

    async fn write_daily_totals(
        &self,
        user_id: UserId,
        day: Date,
        totals: Nutrients,
        goal_calories: f64,
    ) -> AppResult<DailyNutrition> {
        let mut t = self.tables.lock().await;
        let row = t
            .daily
            .entry((user_id, day))
            .or_insert_with(|| DailyNutrition::empty(user_id, day, goal_calories));
        row.totals = totals;
        row.goal_calories = goal_calories;
        Ok(row.clone())
    }

    async fn resum_daily_totals(
        &self,
        user_id: UserId,
        day: Date,
        start: OffsetDateTime,
        end: OffsetDateTime,
        goal_calories: f64,
    ) -> AppResult<DailyNutrition> {
        let mut t = self.tables.lock().await;
        let totals: Nutrients = t
            .meals
            .values()
            .filter(|m| m.user_id == user_id && m.eaten_at >= start && m.eaten_at < end)
            .map(|m| m.totals)
            .sum();
        let row = t
            .daily
            .entry((user_id, day))
            .or_insert_with(|| DailyNutrition::empty(user_id, day, goal_calories));
        row.totals = totals;
        row.goal_calories = goal_calories;
        Ok(row.clone())
    }

    async fn increment_daily_totals(
        &self,
        user_id: UserId,
        day: Date,
        delta: Nutrients,
        goal_if_new: f64,
    ) -> AppResult<DailyNutrition> {
        let mut t = self.tables.lock().await;
        let row = t
            .daily
            .entry((user_id, day))
            .or_insert_with(|| DailyNutrition::empty(user_id, day, goal_if_new));
        row.totals += delta;
        Ok(row.clone())
    }

    async fn set_daily_invalid(
        &self,
        user_id: UserId,
        day: Date,
        invalid: bool,
        goal_if_new: f64,
    ) -> AppResult<DailyNutrition> {
        let mut t = self.tables.lock().await;
        let row = t
            .daily
            .entry((user_id, day))
            .or_insert_with(|| DailyNutrition::empty(user_id, day, goal_if_new));
        row.invalid = invalid;
        Ok(row.clone())
    }

    async fn set_goal_met(&self, user_id: UserId, day: Date, goal_met: bool) -> AppResult<()> {
        let mut t = self.tables.lock().await;
        if let Some(row) = t.daily.get_mut(&(user_id, day)) {
            row.goal_met = goal_met;
        }
        Ok(())
    }

    async fn find_points(&self, user_id: UserId, day: Date) -> AppResult<Option<DailyPoints>> {
        Ok(self.tables.lock().await.points.get(&(user_id, day)).cloned())
    }

    async fn list_points(&self, user_id: UserId) -> AppResult<Vec<DailyPoints>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<DailyPoints> = t
            .points
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.day);
        Ok(rows)
    }

    async fn add_category_points(
        &self,
        user_id: UserId,
        day: Date,
        category: PointCategory,
        delta: i32,
    ) -> AppResult<DailyPoints> {
        let mut t = self.tables.lock().await;
        let row = t.points_row(user_id, day);
        *row.category_mut(category) += delta;
        row.total_points += delta;
        Ok(row.clone())
    }

    async fn set_category_points(
        &self,
        user_id: UserId,
        day: Date,
        category: PointCategory,
        value: i32,
    ) -> AppResult<DailyPoints> {
        let mut t = self.tables.lock().await;
        let row = t.points_row(user_id, day);
        let previous = row.category(category);
        *row.category_mut(category) = value;
        row.total_points += value - previous;
        Ok(row.clone())
    }

    async fn reset_points(
        &self,
        user_id: UserId,
        day: Date,
        exercise_points: i32,
        calorie_points: i32,
    ) -> AppResult<DailyPoints> {
        let mut t = self.tables.lock().await;
        let row = t.points_row(user_id, day);
        row.exercise_points = exercise_points;
        row.calorie_points = calorie_points;
        row.total_points = exercise_points + calorie_points;
        Ok(row.clone())
    }

    async fn insert_exercise(&self, new: NewExercise) -> AppResult<Exercise> {
        let mut t = self.tables.lock().await;
        let exercise = Exercise {
            id: t.id(),
            user_id: new.user_id,
            kind: new.kind,
            name: new.name,
            description: new.description,
            duration_minutes: new.duration_minutes,
            points: new.points,
            performed_at: new.performed_at,
        };
        t.exercises.insert(exercise.id, exercise.clone());
        Ok(exercise)
    }

    async fn find_exercise(&self, id: ExerciseId) -> AppResult<Option<Exercise>> {
        Ok(self.tables.lock().await.exercises.get(&id).cloned())
    }

    async fn update_exercise(
        &self,
        id: ExerciseId,
        changes: ExerciseChanges,
    ) -> AppResult<Option<(Exercise, i32)>> {
        let mut t = self.tables.lock().await;
        Ok(t.exercises.get_mut(&id).map(|e| {
            let previous = e.points;
            e.kind = changes.kind;
            e.name = changes.name;
            e.description = changes.description;
            e.duration_minutes = changes.duration_minutes;
            e.points = changes.points;
            (e.clone(), previous)
        }))
    }

    async fn delete_exercise(&self, id: ExerciseId) -> AppResult<Option<Exercise>> {
        Ok(self.tables.lock().await.exercises.remove(&id))
    }

    async fn list_exercises(&self, user_id: UserId) -> AppResult<Vec<Exercise>> {
        let t = self.tables.lock().await;
        let mut rows: Vec<Exercise> = t
            .exercises
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.performed_at.cmp(&a.performed_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn find_streak(&self, user_id: UserId) -> AppResult<Option<Streak>> {
        Ok(self.tables.lock().await.streaks.get(&user_id).cloned())
    }

    async fn save_streak(&self, streak: &Streak) -> AppResult<()> {
        let mut t = self.tables.lock().await;
        t.streaks.insert(streak.user_id, streak.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[tokio::test]
    async fn set_category_moves_total_by_difference() {
        let store = MemoryStore::new();
        let day = date!(2026-03-10);
        store
            .add_category_points(1, day, PointCategory::Exercise, 3)
            .await
            .unwrap();
        let row = store
            .set_category_points(1, day, PointCategory::CalorieGoal, 2)
            .await
            .unwrap();
        assert_eq!((row.exercise_points, row.calorie_points, row.total_points), (3, 2, 5));

        let row = store
            .set_category_points(1, day, PointCategory::CalorieGoal, 0)
            .await
            .unwrap();
        assert_eq!(row.total_points, 3);
        row.check_invariant().unwrap();
    }

    #[tokio::test]
    async fn increment_keeps_existing_goal_snapshot() {
        let store = MemoryStore::new();
        let day = date!(2026-03-10);
        store
            .increment_daily_totals(1, day, Nutrients::new(100.0, 1.0, 2.0, 3.0), 1800.0)
            .await
            .unwrap();
        let row = store
            .increment_daily_totals(1, day, Nutrients::new(50.0, 0.0, 0.0, 0.0), 2500.0)
            .await
            .unwrap();
        assert_eq!(row.goal_calories, 1800.0);
        assert_eq!(row.totals.calories, 150.0);
    }

    #[tokio::test]
    async fn deleting_meal_drops_its_items() {
        use crate::meals::repo_types::{MealSlot, NewLineItem};
        use crate::meals::units::Unit;

        let store = MemoryStore::new();
        let (meal, items) = store
            .insert_meal(NewMeal {
                user_id: 1,
                slot: MealSlot::Lunch,
                eaten_at: OffsetDateTime::now_utc(),
                totals: Nutrients::new(10.0, 0.0, 0.0, 0.0),
                items: vec![NewLineItem {
                    food: LineFood::Catalog(7),
                    quantity: 100.0,
                    unit: Unit::G,
                    totals: Nutrients::new(10.0, 0.0, 0.0, 0.0),
                }],
            })
            .await
            .unwrap();
        assert!(store.delete_meal(meal.id).await.unwrap());
        assert!(store.find_line_item(items[0].id).await.unwrap().is_none());
        assert!(!store.delete_meal(meal.id).await.unwrap());
    }
}

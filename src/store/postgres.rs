use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::{Date, OffsetDateTime};

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

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

// ---- rows ----

#[derive(FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    color: String,
    avatar: Option<String>,
    calorie_goal: f64,
    protein_goal: f64,
    carbs_goal: f64,
    fat_goal: f64,
    created_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            color: r.color.parse()?,
            avatar: r.avatar,
            goals: Goals {
                calories: r.calorie_goal,
                protein: r.protein_goal,
                carbs: r.carbs_goal,
                fat: r.fat_goal,
            },
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct FoodRow {
    id: i64,
    name: String,
    #[sqlx(flatten)]
    nutrients: Nutrients,
}

impl From<FoodRow> for FoodItem {
    fn from(r: FoodRow) -> Self {
        FoodItem {
            id: r.id,
            name: r.name,
            per_reference: r.nutrients,
        }
    }
}

#[derive(FromRow)]
struct MealRow {
    id: i64,
    user_id: i64,
    slot: String,
    eaten_at: OffsetDateTime,
    #[sqlx(flatten)]
    nutrients: Nutrients,
}

impl TryFrom<MealRow> for Meal {
    type Error = AppError;

    fn try_from(r: MealRow) -> Result<Self, Self::Error> {
        Ok(Meal {
            id: r.id,
            user_id: r.user_id,
            slot: r.slot.parse()?,
            eaten_at: r.eaten_at,
            totals: r.nutrients,
        })
    }
}

#[derive(FromRow)]
struct LineItemRow {
    id: i64,
    meal_id: i64,
    food_id: i64,
    quantity: f64,
    unit: String,
    #[sqlx(flatten)]
    nutrients: Nutrients,
}

impl TryFrom<LineItemRow> for MealLineItem {
    type Error = AppError;

    fn try_from(r: LineItemRow) -> Result<Self, Self::Error> {
        Ok(MealLineItem {
            id: r.id,
            meal_id: r.meal_id,
            food_id: r.food_id,
            quantity: r.quantity,
            unit: r.unit.parse()?,
            totals: r.nutrients,
        })
    }
}

#[derive(FromRow)]
struct DailyRow {
    user_id: i64,
    day: Date,
    #[sqlx(flatten)]
    nutrients: Nutrients,
    goal_calories: f64,
    goal_met: bool,
    invalid: bool,
}

impl From<DailyRow> for DailyNutrition {
    fn from(r: DailyRow) -> Self {
        DailyNutrition {
            user_id: r.user_id,
            day: r.day,
            totals: r.nutrients,
            goal_calories: r.goal_calories,
            goal_met: r.goal_met,
            invalid: r.invalid,
        }
    }
}

#[derive(FromRow)]
struct PointsRow {
    user_id: i64,
    day: Date,
    exercise_points: i32,
    calorie_points: i32,
    total_points: i32,
}

impl From<PointsRow> for DailyPoints {
    fn from(r: PointsRow) -> Self {
        DailyPoints {
            user_id: r.user_id,
            day: r.day,
            exercise_points: r.exercise_points,
            calorie_points: r.calorie_points,
            total_points: r.total_points,
        }
    }
}

#[derive(FromRow)]
struct ExerciseRow {
    id: i64,
    user_id: i64,
    kind: String,
    name: String,
    description: Option<String>,
    duration_minutes: i32,
    points: i32,
    performed_at: OffsetDateTime,
}

impl TryFrom<ExerciseRow> for Exercise {
    type Error = AppError;

    fn try_from(r: ExerciseRow) -> Result<Self, Self::Error> {
        Ok(Exercise {
            id: r.id,
            user_id: r.user_id,
            kind: r.kind.parse()?,
            name: r.name,
            description: r.description,
            duration_minutes: r.duration_minutes,
            points: r.points,
            performed_at: r.performed_at,
        })
    }
}

#[derive(FromRow)]
struct StreakRow {
    user_id: i64,
    current_count: i32,
    longest_count: i32,
    last_date: Option<Date>,
}

impl From<StreakRow> for Streak {
    fn from(r: StreakRow) -> Self {
        Streak {
            user_id: r.user_id,
            current: r.current_count,
            longest: r.longest_count,
            last_date: r.last_date,
        }
    }
}

const USER_COLS: &str = "id, name, email, password_hash, color, avatar, calorie_goal, protein_goal, carbs_goal, fat_goal, created_at";
const MEAL_COLS: &str = "id, user_id, slot, eaten_at, calories, protein, carbs, fat";
const ITEM_COLS: &str = "id, meal_id, food_id, quantity, unit, calories, protein, carbs, fat";
const DAILY_COLS: &str = "user_id, day, calories, protein, carbs, fat, goal_calories, goal_met, invalid";
const POINTS_COLS: &str = "user_id, day, exercise_points, calorie_points, total_points";
const EXERCISE_COLS: &str = "id, user_id, kind, name, description, duration_minutes, points, performed_at";

fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn collect<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, new: NewUser) -> AppResult<User> {
        // Takes the lowest free seat. With both seats held the SELECT yields no
        // row; two racing inserts for the same seat collide on users_seat_key.
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (seat, name, email, password_hash, color, avatar,
                               calorie_goal, protein_goal, carbs_goal, fat_goal)
            SELECT s, $1, $2, $3, $4, $5, $6, $7, $8, $9
              FROM generate_series(1, $10::int) AS s
             WHERE s NOT IN (SELECT seat FROM users)
             ORDER BY s
             LIMIT 1
            RETURNING {USER_COLS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.color.as_str())
        .bind(&new.avatar)
        .bind(new.goals.calories)
        .bind(new.goals.protein)
        .bind(new.goals.carbs)
        .bind(new.goals.fat)
        .bind(MAX_COMPETITORS as i32)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.constraint() == Some("users_seat_key") => {
                AppError::Conflict("both competitors are already registered".into())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("email or color already registered".into())
            }
            _ => AppError::from(e),
        })?
        .ok_or_else(|| AppError::Conflict("both competitors are already registered".into()))?;
        row.try_into()
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLS} FROM users ORDER BY id ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        collect(rows)
    }

    async fn update_goals(&self, id: UserId, goals: Goals) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET calorie_goal = $2, protein_goal = $3, carbs_goal = $4, fat_goal = $5
             WHERE id = $1
            RETURNING {USER_COLS}
            "#
        ))
        .bind(id)
        .bind(goals.calories)
        .bind(goals.protein)
        .bind(goals.carbs)
        .bind(goals.fat)
        .fetch_optional(&self.db)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn create_food(&self, new: NewFood) -> AppResult<FoodItem> {
        let row = sqlx::query_as::<_, FoodRow>(
            r#"
            INSERT INTO foods (name, calories, protein, carbs, fat)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, calories, protein, carbs, fat
            "#,
        )
        .bind(&new.name)
        .bind(new.per_reference.calories)
        .bind(new.per_reference.protein)
        .bind(new.per_reference.carbs)
        .bind(new.per_reference.fat)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn find_foods(&self, ids: &[FoodId]) -> AppResult<Vec<FoodItem>> {
        let rows = sqlx::query_as::<_, FoodRow>(
            "SELECT id, name, calories, protein, carbs, fat FROM foods WHERE id = ANY($1)",
        )
        .bind(ids.to_vec())
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(FoodItem::from).collect())
    }

    async fn search_foods(&self, query: &str, limit: i64) -> AppResult<Vec<FoodItem>> {
        let rows = sqlx::query_as::<_, FoodRow>(
            r#"
            SELECT id, name, calories, protein, carbs, fat
              FROM foods
             WHERE name ILIKE '%' || $1 || '%'
             ORDER BY length(name) ASC, id ASC
             LIMIT $2
            "#,
        )
        .bind(escape_like(query))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(FoodItem::from).collect())
    }

    async fn insert_meal(&self, new: NewMeal) -> AppResult<(Meal, Vec<MealLineItem>)> {
        let mut tx = self.db.begin().await?;

        let meal_row = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            INSERT INTO meals (user_id, slot, eaten_at, calories, protein, carbs, fat)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {MEAL_COLS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.slot.as_str())
        .bind(new.eaten_at)
        .bind(new.totals.calories)
        .bind(new.totals.protein)
        .bind(new.totals.carbs)
        .bind(new.totals.fat)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(new.items.len());
        for item in &new.items {
            let food_id = match &item.food {
                LineFood::Catalog(id) => *id,
                LineFood::Inline(food) => {
                    sqlx::query_scalar::<_, i64>(
                        r#"
                        INSERT INTO foods (name, calories, protein, carbs, fat)
                        VALUES ($1, $2, $3, $4, $5)
                        RETURNING id
                        "#,
                    )
                    .bind(&food.name)
                    .bind(food.per_reference.calories)
                    .bind(food.per_reference.protein)
                    .bind(food.per_reference.carbs)
                    .bind(food.per_reference.fat)
                    .fetch_one(&mut *tx)
                    .await?
                }
            };
            let row = sqlx::query_as::<_, LineItemRow>(&format!(
                r#"
                INSERT INTO meal_items (meal_id, food_id, quantity, unit, calories, protein, carbs, fat)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING {ITEM_COLS}
                "#
            ))
            .bind(meal_row.id)
            .bind(food_id)
            .bind(item.quantity)
            .bind(item.unit.as_str())
            .bind(item.totals.calories)
            .bind(item.totals.protein)
            .bind(item.totals.carbs)
            .bind(item.totals.fat)
            .fetch_one(&mut *tx)
            .await?;
            items.push(MealLineItem::try_from(row)?);
        }

        tx.commit().await?;
        Ok((Meal::try_from(meal_row)?, items))
    }

    async fn find_meal(&self, id: MealId) -> AppResult<Option<Meal>> {
        let row = sqlx::query_as::<_, MealRow>(&format!(
            "SELECT {MEAL_COLS} FROM meals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(Meal::try_from).transpose()
    }

    async fn list_line_items(&self, meal_id: MealId) -> AppResult<Vec<MealLineItem>> {
        let rows = sqlx::query_as::<_, LineItemRow>(&format!(
            "SELECT {ITEM_COLS} FROM meal_items WHERE meal_id = $1 ORDER BY id ASC"
        ))
        .bind(meal_id)
        .fetch_all(&self.db)
        .await?;
        collect(rows)
    }

    async fn find_line_item(&self, id: LineItemId) -> AppResult<Option<MealLineItem>> {
        let row = sqlx::query_as::<_, LineItemRow>(&format!(
            "SELECT {ITEM_COLS} FROM meal_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(MealLineItem::try_from).transpose()
    }

    async fn update_line_item(
        &self,
        id: LineItemId,
        quantity: f64,
        totals: Nutrients,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE meal_items
               SET quantity = $2, calories = $3, protein = $4, carbs = $5, fat = $6
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(totals.calories)
        .bind(totals.protein)
        .bind(totals.carbs)
        .bind(totals.fat)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_line_item(&self, id: LineItemId) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM meal_items WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_meal_totals(&self, id: MealId, totals: Nutrients) -> AppResult<()> {
        sqlx::query(
            "UPDATE meals SET calories = $2, protein = $3, carbs = $4, fat = $5 WHERE id = $1",
        )
        .bind(id)
        .bind(totals.calories)
        .bind(totals.protein)
        .bind(totals.carbs)
        .bind(totals.fat)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_meal(&self, id: MealId) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM meals WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn meals_between(
        &self,
        user_id: UserId,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> AppResult<Vec<Meal>> {
        let rows = sqlx::query_as::<_, MealRow>(&format!(
            r#"
            SELECT {MEAL_COLS}
              FROM meals
             WHERE user_id = $1 AND eaten_at >= $2 AND eaten_at < $3
             ORDER BY eaten_at ASC, id ASC
            "#
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;
        collect(rows)
    }

    async fn list_meals(&self, user_id: UserId) -> AppResult<Vec<Meal>> {
        let rows = sqlx::query_as::<_, MealRow>(&format!(
            "SELECT {MEAL_COLS} FROM meals WHERE user_id = $1 ORDER BY eaten_at ASC, id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        collect(rows)
    }

    async fn find_daily(&self, user_id: UserId, day: Date) -> AppResult<Option<DailyNutrition>> {
        let row = sqlx::query_as::<_, DailyRow>(&format!(
            "SELECT {DAILY_COLS} FROM daily_nutrition WHERE user_id = $1 AND day = $2"
        ))
        .bind(user_id)
        .bind(day)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(DailyNutrition::from))
    }

    async fn list_daily(&self, user_id: UserId) -> AppResult<Vec<DailyNutrition>> {
        let rows = sqlx::query_as::<_, DailyRow>(&format!(
            "SELECT {DAILY_COLS} FROM daily_nutrition WHERE user_id = $1 ORDER BY day ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(DailyNutrition::from).collect())
    }

    async fn write_daily_totals(
        &self,
        user_id: UserId,
        day: Date,
        totals: Nutrients,
        goal_calories: f64,
    ) -> AppResult<DailyNutrition> {
        let row = sqlx::query_as::<_, DailyRow>(&format!(
            r#"
            INSERT INTO daily_nutrition (user_id, day, calories, protein, carbs, fat, goal_calories)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, day) DO UPDATE
               SET calories = EXCLUDED.calories,
                   protein = EXCLUDED.protein,
                   carbs = EXCLUDED.carbs,
                   fat = EXCLUDED.fat,
                   goal_calories = EXCLUDED.goal_calories,
                   updated_at = now()
            RETURNING {DAILY_COLS}
            "#
        ))
        .bind(user_id)
        .bind(day)
        .bind(totals.calories)
        .bind(totals.protein)
        .bind(totals.carbs)
        .bind(totals.fat)
        .bind(goal_calories)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn resum_daily_totals(
        &self,
        user_id: UserId,
        day: Date,
        start: OffsetDateTime,
        end: OffsetDateTime,
        goal_calories: f64,
    ) -> AppResult<DailyNutrition> {
        let mut tx = self.db.begin().await?;

        // Held until commit. The sum below runs after the previous holder
        // committed, so it sees every meal whose own re-sum came first.
        sqlx::query(
            "SELECT pg_advisory_xact_lock(hashtextextended(format('daily:%s:%s', $1::bigint, $2::date), 0))",
        )
        .bind(user_id)
        .bind(day)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, DailyRow>(&format!(
            r#"
            INSERT INTO daily_nutrition (user_id, day, calories, protein, carbs, fat, goal_calories)
            SELECT $1, $2,
                   COALESCE(SUM(calories), 0), COALESCE(SUM(protein), 0),
                   COALESCE(SUM(carbs), 0), COALESCE(SUM(fat), 0),
                   $5
              FROM meals
             WHERE user_id = $1 AND eaten_at >= $3 AND eaten_at < $4
            ON CONFLICT (user_id, day) DO UPDATE
               SET calories = EXCLUDED.calories,
                   protein = EXCLUDED.protein,
                   carbs = EXCLUDED.carbs,
                   fat = EXCLUDED.fat,
                   goal_calories = EXCLUDED.goal_calories,
                   updated_at = now()
            RETURNING {DAILY_COLS}
            "#
        ))
        .bind(user_id)
        .bind(day)
        .bind(start)
        .bind(end)
        .bind(goal_calories)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn increment_daily_totals(
        &self,
        user_id: UserId,
        day: Date,
        delta: Nutrients,
        goal_if_new: f64,
    ) -> AppResult<DailyNutrition> {
        let row = sqlx::query_as::<_, DailyRow>(&format!(
            r#"
            INSERT INTO daily_nutrition (user_id, day, calories, protein, carbs, fat, goal_calories)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, day) DO UPDATE
               SET calories = daily_nutrition.calories + EXCLUDED.calories,
                   protein = daily_nutrition.protein + EXCLUDED.protein,
                   carbs = daily_nutrition.carbs + EXCLUDED.carbs,
                   fat = daily_nutrition.fat + EXCLUDED.fat,
                   updated_at = now()
            RETURNING {DAILY_COLS}
            "#
        ))
        .bind(user_id)
        .bind(day)
        .bind(delta.calories)
        .bind(delta.protein)
        .bind(delta.carbs)
        .bind(delta.fat)
        .bind(goal_if_new)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn set_daily_invalid(
        &self,
        user_id: UserId,
        day: Date,
        invalid: bool,
        goal_if_new: f64,
    ) -> AppResult<DailyNutrition> {
        let row = sqlx::query_as::<_, DailyRow>(&format!(
            r#"
            INSERT INTO daily_nutrition (user_id, day, goal_calories, invalid)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, day) DO UPDATE
               SET invalid = EXCLUDED.invalid,
                   updated_at = now()
            RETURNING {DAILY_COLS}
            "#
        ))
        .bind(user_id)
        .bind(day)
        .bind(goal_if_new)
        .bind(invalid)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn set_goal_met(&self, user_id: UserId, day: Date, goal_met: bool) -> AppResult<()> {
        sqlx::query(
            "UPDATE daily_nutrition SET goal_met = $3, updated_at = now() WHERE user_id = $1 AND day = $2",
        )
        .bind(user_id)
        .bind(day)
        .bind(goal_met)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_points(&self, user_id: UserId, day: Date) -> AppResult<Option<DailyPoints>> {
        let row = sqlx::query_as::<_, PointsRow>(&format!(
            "SELECT {POINTS_COLS} FROM daily_points WHERE user_id = $1 AND day = $2"
        ))
        .bind(user_id)
        .bind(day)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(DailyPoints::from))
    }

    async fn list_points(&self, user_id: UserId) -> AppResult<Vec<DailyPoints>> {
        let rows = sqlx::query_as::<_, PointsRow>(&format!(
            "SELECT {POINTS_COLS} FROM daily_points WHERE user_id = $1 ORDER BY day ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(DailyPoints::from).collect())
    }

    async fn add_category_points(
        &self,
        user_id: UserId,
        day: Date,
        category: PointCategory,
        delta: i32,
    ) -> AppResult<DailyPoints> {
        let col = category.column();
        let row = sqlx::query_as::<_, PointsRow>(&format!(
            r#"
            INSERT INTO daily_points (user_id, day, {col}, total_points)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (user_id, day) DO UPDATE
               SET {col} = daily_points.{col} + EXCLUDED.{col},
                   total_points = daily_points.total_points + EXCLUDED.{col}
            RETURNING {POINTS_COLS}
            "#
        ))
        .bind(user_id)
        .bind(day)
        .bind(delta)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn set_category_points(
        &self,
        user_id: UserId,
        day: Date,
        category: PointCategory,
        value: i32,
    ) -> AppResult<DailyPoints> {
        let col = category.column();
        // SET expressions read the pre-update row, so the total moves by exactly
        // the category difference.
        let row = sqlx::query_as::<_, PointsRow>(&format!(
            r#"
            INSERT INTO daily_points (user_id, day, {col}, total_points)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (user_id, day) DO UPDATE
               SET total_points = daily_points.total_points - daily_points.{col} + EXCLUDED.{col},
                   {col} = EXCLUDED.{col}
            RETURNING {POINTS_COLS}
            "#
        ))
        .bind(user_id)
        .bind(day)
        .bind(value)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn reset_points(
        &self,
        user_id: UserId,
        day: Date,
        exercise_points: i32,
        calorie_points: i32,
    ) -> AppResult<DailyPoints> {
        let row = sqlx::query_as::<_, PointsRow>(&format!(
            r#"
            INSERT INTO daily_points (user_id, day, exercise_points, calorie_points, total_points)
            VALUES ($1, $2, $3, $4, $3 + $4)
            ON CONFLICT (user_id, day) DO UPDATE
               SET exercise_points = EXCLUDED.exercise_points,
                   calorie_points = EXCLUDED.calorie_points,
                   total_points = EXCLUDED.total_points
            RETURNING {POINTS_COLS}
            "#
        ))
        .bind(user_id)
        .bind(day)
        .bind(exercise_points)
        .bind(calorie_points)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn insert_exercise(&self, new: NewExercise) -> AppResult<Exercise> {
        let row = sqlx::query_as::<_, ExerciseRow>(&format!(
            r#"
            INSERT INTO exercises (user_id, kind, name, description, duration_minutes, points, performed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {EXERCISE_COLS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.kind.as_str())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.duration_minutes)
        .bind(new.points)
        .bind(new.performed_at)
        .fetch_one(&self.db)
        .await?;
        row.try_into()
    }

    async fn find_exercise(&self, id: ExerciseId) -> AppResult<Option<Exercise>> {
        let row = sqlx::query_as::<_, ExerciseRow>(&format!(
            "SELECT {EXERCISE_COLS} FROM exercises WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(Exercise::try_from).transpose()
    }

    async fn update_exercise(
        &self,
        id: ExerciseId,
        changes: ExerciseChanges,
    ) -> AppResult<Option<(Exercise, i32)>> {
        let mut tx = self.db.begin().await?;

        let previous = sqlx::query_scalar::<_, i32>(
            "SELECT points FROM exercises WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(previous) = previous else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, ExerciseRow>(&format!(
            r#"
            UPDATE exercises
               SET kind = $2, name = $3, description = $4, duration_minutes = $5, points = $6
             WHERE id = $1
            RETURNING {EXERCISE_COLS}
            "#
        ))
        .bind(id)
        .bind(changes.kind.as_str())
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.duration_minutes)
        .bind(changes.points)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((Exercise::try_from(row)?, previous)))
    }

    async fn delete_exercise(&self, id: ExerciseId) -> AppResult<Option<Exercise>> {
        let row = sqlx::query_as::<_, ExerciseRow>(&format!(
            "DELETE FROM exercises WHERE id = $1 RETURNING {EXERCISE_COLS}"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(Exercise::try_from).transpose()
    }

    async fn list_exercises(&self, user_id: UserId) -> AppResult<Vec<Exercise>> {
        let rows = sqlx::query_as::<_, ExerciseRow>(&format!(
            "SELECT {EXERCISE_COLS} FROM exercises WHERE user_id = $1 ORDER BY performed_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        collect(rows)
    }

    async fn find_streak(&self, user_id: UserId) -> AppResult<Option<Streak>> {
        let row = sqlx::query_as::<_, StreakRow>(
            "SELECT user_id, current_count, longest_count, last_date FROM streaks WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Streak::from))
    }

    async fn save_streak(&self, streak: &Streak) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO streaks (user_id, current_count, longest_count, last_date)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
               SET current_count = EXCLUDED.current_count,
                   longest_count = EXCLUDED.longest_count,
                   last_date = EXCLUDED.last_date
            "#,
        )
        .bind(streak.user_id)
        .bind(streak.current)
        .bind(streak.longest)
        .bind(streak.last_date)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AppError;
use crate::foods::repo_types::{FoodId, NewFood};
use crate::meals::units::Unit;
use crate::nutrients::Nutrients;
use crate::users::repo_types::UserId;

pub type MealId = i64;
pub type LineItemId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealSlot {
    #[serde(alias = "CAFE_DA_MANHA")]
    Breakfast,
    #[serde(alias = "ALMOCO")]
    Lunch,
    #[serde(alias = "LANCHE")]
    Snack,
    #[serde(alias = "JANTAR")]
    Dinner,
}

impl MealSlot {
    pub const ALL: [MealSlot; 4] = [
        MealSlot::Breakfast,
        MealSlot::Lunch,
        MealSlot::Snack,
        MealSlot::Dinner,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Snack => "snack",
            MealSlot::Dinner => "dinner",
        }
    }
}

impl FromStr for MealSlot {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MealSlot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("unknown meal slot {s:?}")))
    }
}

/// Meal header. `totals` is a cache of the sum of its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub id: MealId,
    pub user_id: UserId,
    pub slot: MealSlot,
    #[serde(with = "time::serde::rfc3339")]
    pub eaten_at: OffsetDateTime,
    pub totals: Nutrients,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealLineItem {
    pub id: LineItemId,
    pub meal_id: MealId,
    pub food_id: FoodId,
    pub quantity: f64,
    pub unit: Unit,
    pub totals: Nutrients,
}

/// Food behind a new line: an existing catalog row, or one carried inline
/// that is created together with the meal.
#[derive(Debug, Clone)]
pub enum LineFood {
    Catalog(FoodId),
    Inline(NewFood),
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub food: LineFood,
    pub quantity: f64,
    pub unit: Unit,
    pub totals: Nutrients,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub user_id: UserId,
    pub slot: MealSlot,
    pub eaten_at: OffsetDateTime,
    pub totals: Nutrients,
    pub items: Vec<NewLineItem>,
}

/// Sum of line totals, the only valid value for a meal's cached totals.
pub fn sum_line_totals<'a>(items: impl IntoIterator<Item = &'a MealLineItem>) -> Nutrients {
    items.into_iter().map(|i| i.totals).sum()
}

use serde::{Deserialize, Serialize};

use crate::foods::repo_types::FoodId;
use crate::meals::repo_types::{Meal, MealLineItem, MealSlot};

/// Where a line item's nutrition comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FoodSource {
    /// Values per reference quantity. A positive id points at the catalog and
    /// the carried values are ignored; a non-positive id is a transient food
    /// persisted from its own values on save.
    Reference {
        id: FoodId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        calories: Option<f64>,
        #[serde(default)]
        protein: Option<f64>,
        #[serde(default)]
        carbs: Option<f64>,
        #[serde(default)]
        fat: Option<f64>,
    },
    /// Values already scaled to the line's quantity (photo analysis).
    Scaled {
        name: String,
        calories: f64,
        #[serde(default)]
        protein: f64,
        #[serde(default)]
        carbs: f64,
        #[serde(default)]
        fat: f64,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemInput {
    pub food: FoodSource,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveMealRequest {
    pub slot: MealSlot,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
    /// `YYYY-MM-DD`; today when absent.
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: f64,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealWithItems {
    #[serde(flatten)]
    pub meal: Meal,
    pub items: Vec<MealLineItem>,
}

/// Result of removing a line item; `meal` is `None` when it was the last one.
#[derive(Debug, Clone, Serialize)]
pub struct LineItemRemoved {
    pub meal_deleted: bool,
    pub meal: Option<MealWithItems>,
}

use serde::{Deserialize, Serialize};

use crate::nutrients::Nutrients;

pub type FoodId = i64;

/// Catalog entry. `per_reference` holds the values for 100 g / 100 ml, or for
/// one unit when the item is logged with a count unit.
///
/// A non-positive id marks a transient item that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: FoodId,
    pub name: String,
    #[serde(flatten)]
    pub per_reference: Nutrients,
}

impl FoodItem {
    pub fn is_transient(&self) -> bool {
        self.id <= 0
    }
}

#[derive(Debug, Clone)]
pub struct NewFood {
    pub name: String,
    pub per_reference: Nutrients,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodOrigin {
    Local,
    OpenFoodFacts,
}

/// A search hit, already normalised to per-reference values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodCandidate {
    pub origin: FoodOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(flatten)]
    pub food: FoodItem,
}

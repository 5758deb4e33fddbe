use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::nutrients::Nutrients;

/// Unit a line item quantity is expressed in.
///
/// Weight/volume units scale a food's per-100 values by `quantity / 100`;
/// count units treat the food's values as "per one" and scale by `quantity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[serde(alias = "gram", alias = "grams")]
    G,
    Ml,
    #[serde(alias = "un", alias = "piece")]
    Unit,
    #[serde(alias = "porção", alias = "porcao")]
    Serving,
    #[serde(alias = "prato")]
    Plate,
    #[serde(alias = "fatia")]
    Slice,
    #[serde(alias = "colher")]
    Spoon,
    #[serde(alias = "xícara", alias = "xicara")]
    Cup,
    #[serde(alias = "copo")]
    Glass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Food values are per 100 of this unit.
    Reference,
    /// Food values are per one of this unit.
    Count,
}

impl Unit {
    pub fn kind(self) -> UnitKind {
        match self {
            Unit::G | Unit::Ml => UnitKind::Reference,
            _ => UnitKind::Count,
        }
    }

    pub fn multiplier(self, quantity: f64) -> f64 {
        match self.kind() {
            UnitKind::Reference => quantity / 100.0,
            UnitKind::Count => quantity,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::G => "g",
            Unit::Ml => "ml",
            Unit::Unit => "unit",
            Unit::Serving => "serving",
            Unit::Plate => "plate",
            Unit::Slice => "slice",
            Unit::Spoon => "spoon",
            Unit::Cup => "cup",
            Unit::Glass => "glass",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unit = match s.trim().to_lowercase().as_str() {
            "g" | "gram" | "grams" => Unit::G,
            "ml" => Unit::Ml,
            "unit" | "un" | "piece" => Unit::Unit,
            "serving" | "porção" | "porcao" => Unit::Serving,
            "plate" | "prato" => Unit::Plate,
            "slice" | "fatia" => Unit::Slice,
            "spoon" | "colher" => Unit::Spoon,
            "cup" | "xícara" | "xicara" => Unit::Cup,
            "glass" | "copo" => Unit::Glass,
            other => return Err(AppError::validation(format!("unknown unit {other:?}"))),
        };
        Ok(unit)
    }
}

/// Totals of one line: the food's per-reference values scaled for `quantity` of `unit`.
pub fn compute_line_totals(per_reference: Nutrients, quantity: f64, unit: Unit) -> Nutrients {
    per_reference.scale(unit.multiplier(quantity))
}

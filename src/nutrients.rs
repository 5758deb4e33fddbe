use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Calories (kcal) plus the three tracked macros (grams).
///
/// Used both for per-reference food values and for computed totals of a
/// line item, a meal or a day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Nutrients {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Nutrients {
    pub const ZERO: Nutrients = Nutrients {
        calories: 0.0,
        protein: 0.0,
        carbs: 0.0,
        fat: 0.0,
    };

    pub fn new(calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
        }
    }

    pub fn scale(self, factor: f64) -> Self {
        Self {
            calories: self.calories * factor,
            protein: self.protein * factor,
            carbs: self.carbs * factor,
            fat: self.fat * factor,
        }
    }

    /// Calories to whole kcal, macros to one decimal.
    pub fn rounded_for_catalog(self) -> Self {
        Self {
            calories: self.calories.round(),
            protein: round1(self.protein),
            carbs: round1(self.carbs),
            fat: round1(self.fat),
        }
    }

    /// Equality within a small tolerance; sums of floats are compared with this.
    pub fn approx_eq(&self, other: &Nutrients) -> bool {
        const EPS: f64 = 1e-6;
        (self.calories - other.calories).abs() < EPS
            && (self.protein - other.protein).abs() < EPS
            && (self.carbs - other.carbs).abs() < EPS
            && (self.fat - other.fat).abs() < EPS
    }
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl Add for Nutrients {
    type Output = Nutrients;

    fn add(self, rhs: Nutrients) -> Nutrients {
        Nutrients {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

impl Sub for Nutrients {
    type Output = Nutrients;

    fn sub(self, rhs: Nutrients) -> Nutrients {
        self + rhs.scale(-1.0)
    }
}

impl AddAssign for Nutrients {
    fn add_assign(&mut self, rhs: Nutrients) {
        *self = *self + rhs;
    }
}

impl Sum for Nutrients {
    fn sum<I: Iterator<Item = Nutrients>>(iter: I) -> Nutrients {
        iter.fold(Nutrients::ZERO, Add::add)
    }
}

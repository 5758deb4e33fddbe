use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AppError;

pub type UserId = i64;

/// The store refuses a third user even when registrations race.
pub const MAX_COMPETITORS: usize = 2;

/// Colour tag that tells the two competitors apart on every chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserColor {
    #[serde(alias = "AMARELO")]
    Yellow,
    #[serde(alias = "AZUL")]
    Blue,
    #[serde(alias = "VERDE")]
    Green,
    #[serde(alias = "ROSA")]
    Pink,
}

impl UserColor {
    pub fn as_str(self) -> &'static str {
        match self {
            UserColor::Yellow => "yellow",
            UserColor::Blue => "blue",
            UserColor::Green => "green",
            UserColor::Pink => "pink",
        }
    }
}

impl FromStr for UserColor {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yellow" => Ok(UserColor::Yellow),
            "blue" => Ok(UserColor::Blue),
            "green" => Ok(UserColor::Green),
            "pink" => Ok(UserColor::Pink),
            other => Err(AppError::validation(format!("unknown color {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Goals {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.calories > 0.0) {
            return Err(AppError::validation("calorie goal must be greater than zero"));
        }
        if self.protein < 0.0 || self.carbs < 0.0 || self.fat < 0.0 {
            return Err(AppError::validation("macro goals cannot be negative"));
        }
        Ok(())
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub color: UserColor,
    pub avatar: Option<String>,
    pub goals: Goals,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub color: UserColor,
    pub avatar: Option<String>,
    pub goals: Goals,
}

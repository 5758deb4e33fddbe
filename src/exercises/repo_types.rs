use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AppError;
use crate::users::repo_types::UserId;

pub type ExerciseId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    #[serde(alias = "CARDIO")]
    Cardio,
    #[serde(alias = "ACADEMIA")]
    Strength,
    #[serde(alias = "OUTRO")]
    Other,
}

impl ExerciseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseKind::Cardio => "cardio",
            ExerciseKind::Strength => "strength",
            ExerciseKind::Other => "other",
        }
    }

    /// Strength training is worth a flat 2, cardio one point per full 30
    /// minutes, anything else a flat 1.
    pub fn points_for(self, duration_minutes: i32) -> i32 {
        match self {
            ExerciseKind::Strength => 2,
            ExerciseKind::Cardio => duration_minutes.max(0) / 30,
            ExerciseKind::Other => 1,
        }
    }
}

impl FromStr for ExerciseKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cardio" => Ok(ExerciseKind::Cardio),
            "strength" => Ok(ExerciseKind::Strength),
            "other" => Ok(ExerciseKind::Other),
            other => Err(AppError::validation(format!("unknown exercise type {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: ExerciseId,
    pub user_id: UserId,
    pub kind: ExerciseKind,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub points: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub performed_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewExercise {
    pub user_id: UserId,
    pub kind: ExerciseKind,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub points: i32,
    pub performed_at: OffsetDateTime,
}

/// Editable fields of an exercise; the day it was performed on never moves.
#[derive(Debug, Clone)]
pub struct ExerciseChanges {
    pub kind: ExerciseKind,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub points: i32,
}

use serde::Deserialize;

use crate::exercises::repo_types::ExerciseKind;

#[derive(Debug, Clone, Deserialize)]
pub struct LogExerciseRequest {
    #[serde(alias = "type")]
    pub kind: ExerciseKind,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub duration_minutes: i32,
    /// `YYYY-MM-DD`; today when absent.
    #[serde(default)]
    pub date: Option<String>,
}

/// Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateExerciseRequest {
    #[serde(default, alias = "type")]
    pub kind: Option<ExerciseKind>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
}

use tracing::info;

use crate::calendar::Calendar;
use crate::error::{AppError, AppResult};
use crate::exercises::dto::{LogExerciseRequest, UpdateExerciseRequest};
use crate::exercises::repo_types::{Exercise, ExerciseChanges, ExerciseId, NewExercise};
use crate::points::repo_types::PointCategory;
use crate::points::services::award_exercise_points;
use crate::state::AppState;
use crate::streaks::services::{on_exercise_logged, rebuild_streak};
use crate::users::repo_types::UserId;

fn validate(name: &str, duration_minutes: i32) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("exercise name is required"));
    }
    if duration_minutes <= 0 {
        return Err(AppError::validation("duration must be greater than zero"));
    }
    Ok(name.to_string())
}

/// Persists the session, adds its points to the day and counts the day into
/// the streak. Zero-point sessions still count for the streak.
pub async fn log_exercise(
    state: &AppState,
    user_id: UserId,
    req: LogExerciseRequest,
) -> AppResult<Exercise> {
    let name = validate(&req.name, req.duration_minutes)?;
    let target = req
        .date
        .as_deref()
        .map(Calendar::parse_date_key)
        .transpose()?;
    let performed_at = state.calendar.timestamp_for(target);
    let day = state.calendar.date_of(performed_at);
    let points = req.kind.points_for(req.duration_minutes);

    let exercise = state
        .store
        .insert_exercise(NewExercise {
            user_id,
            kind: req.kind,
            name,
            description: req.description.filter(|d| !d.trim().is_empty()),
            duration_minutes: req.duration_minutes,
            points,
            performed_at,
        })
        .await?;
    info!(
        user_id,
        exercise_id = exercise.id,
        kind = exercise.kind.as_str(),
        points,
        %day,
        "exercise logged"
    );

    award_exercise_points(state, user_id, day, points).await?;
    on_exercise_logged(state, user_id, day).await?;
    Ok(exercise)
}

async fn owned_exercise(
    state: &AppState,
    user_id: UserId,
    id: ExerciseId,
) -> AppResult<Exercise> {
    match state.store.find_exercise(id).await? {
        Some(e) if e.user_id == user_id => Ok(e),
        _ => Err(AppError::NotFound("exercise")),
    }
}

/// Applies the edit and moves the day's exercise points by the difference.
pub async fn update_exercise(
    state: &AppState,
    user_id: UserId,
    id: ExerciseId,
    req: UpdateExerciseRequest,
) -> AppResult<Exercise> {
    let current = owned_exercise(state, user_id, id).await?;
    let kind = req.kind.unwrap_or(current.kind);
    let duration_minutes = req.duration_minutes.unwrap_or(current.duration_minutes);
    let name = validate(req.name.as_deref().unwrap_or(&current.name), duration_minutes)?;
    let description = match req.description {
        Some(d) if d.trim().is_empty() => None,
        Some(d) => Some(d),
        None => current.description.clone(),
    };
    let points = kind.points_for(duration_minutes);

    let (updated, previous_points) = state
        .store
        .update_exercise(
            id,
            ExerciseChanges {
                kind,
                name,
                description,
                duration_minutes,
                points,
            },
        )
        .await?
        .ok_or(AppError::NotFound("exercise"))?;

    let delta = points - previous_points;
    if delta != 0 {
        let day = state.calendar.date_of(updated.performed_at);
        state
            .store
            .add_category_points(user_id, day, PointCategory::Exercise, delta)
            .await?
            .check_invariant()?;
        info!(user_id, exercise_id = id, delta, %day, "exercise points adjusted");
    }
    rebuild_streak(state, user_id).await?;
    Ok(updated)
}

/// Removes the session and takes its points back.
pub async fn delete_exercise(state: &AppState, user_id: UserId, id: ExerciseId) -> AppResult<()> {
    owned_exercise(state, user_id, id).await?;
    let exercise = state
        .store
        .delete_exercise(id)
        .await?
        .ok_or(AppError::NotFound("exercise"))?;
    let day = state.calendar.date_of(exercise.performed_at);
    if exercise.points != 0 {
        state
            .store
            .add_category_points(user_id, day, PointCategory::Exercise, -exercise.points)
            .await?
            .check_invariant()?;
    }
    info!(user_id, exercise_id = id, points = exercise.points, %day, "exercise deleted");
    rebuild_streak(state, user_id).await?;
    Ok(())
}

pub async fn list_exercises(state: &AppState, user_id: UserId) -> AppResult<Vec<Exercise>> {
    state.store.list_exercises(user_id).await
}

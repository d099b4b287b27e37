use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::workouts::WorkoutsState;
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{CreateSet, ReplaceSet, Set};

fn set_not_found() -> AppError {
    AppError::NotFound("Set not found".to_string())
}

pub async fn create(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path((id, workout_exercise_id)): Path<(String, String)>,
    Json(input): Json<CreateSet>,
) -> Result<(StatusCode, Json<Set>)> {
    let input = ReplaceSet::from(input);
    input.validate().map_err(AppError::Validation)?;

    state.owned_workout(&id, &auth_user.id).await?;
    state
        .workout_repo
        .find_workout_exercise(&workout_exercise_id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Workout exercise not found".to_string()))?;

    let set = state
        .workout_repo
        .add_set(&id, &workout_exercise_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(set)))
}

/// Full-row replace; every mutable field must be present.
pub async fn replace(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path((id, set_id)): Path<(String, String)>,
    Json(input): Json<ReplaceSet>,
) -> Result<Json<Set>> {
    input.validate().map_err(AppError::Validation)?;
    state.owned_workout(&id, &auth_user.id).await?;

    if !state.workout_repo.replace_set(&set_id, &id, input).await? {
        return Err(set_not_found());
    }
    let set = state
        .workout_repo
        .find_set(&set_id, &id)
        .await?
        .ok_or_else(set_not_found)?;
    Ok(Json(set))
}

pub async fn delete(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path((id, set_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.owned_workout(&id, &auth_user.id).await?;
    if !state.workout_repo.delete_set(&set_id, &id).await? {
        return Err(set_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_all(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.owned_workout(&id, &auth_user.id).await?;
    let removed = state.workout_repo.delete_all_sets(&id).await?;

    tracing::debug!(workout_id = %id, removed, "Cleared workout sets");
    Ok(StatusCode::NO_CONTENT)
}

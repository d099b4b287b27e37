use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::exercise::{ExerciseCategory, BODY_PARTS, CATEGORIES};
use crate::models::{Exercise, ExerciseFilter, ExerciseInput};
use crate::repositories::ExerciseRepository;

#[derive(Clone)]
pub struct ExercisesState {
    pub exercise_repo: ExerciseRepository,
}

#[derive(Serialize)]
pub struct CategoriesResponse {
    pub categories: &'static [ExerciseCategory],
    pub body_parts: &'static [ExerciseCategory],
}

fn not_found() -> AppError {
    AppError::NotFound("Exercise not found".to_string())
}

pub async fn list(
    State(state): State<ExercisesState>,
    auth_user: AuthUser,
    Query(filter): Query<ExerciseFilter>,
) -> Result<Json<Vec<Exercise>>> {
    let exercises = state
        .exercise_repo
        .find_available_for_user(&auth_user.id, filter)
        .await?;
    Ok(Json(exercises))
}

pub async fn categories(_auth_user: AuthUser) -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: CATEGORIES,
        body_parts: BODY_PARTS,
    })
}

pub async fn show(
    State(state): State<ExercisesState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Exercise>> {
    let exercise = state
        .exercise_repo
        .find_visible(&id, &auth_user.id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(exercise))
}

pub async fn create(
    State(state): State<ExercisesState>,
    auth_user: AuthUser,
    Json(input): Json<ExerciseInput>,
) -> Result<(StatusCode, Json<Exercise>)> {
    let input = input.normalized().map_err(AppError::Validation)?;
    let exercise = state.exercise_repo.create(&auth_user.id, input).await?;

    tracing::debug!(exercise_id = %exercise.id, "Custom exercise created");
    Ok((StatusCode::CREATED, Json(exercise)))
}

/// Full replace. Built-in and foreign exercises are reported as missing.
pub async fn update(
    State(state): State<ExercisesState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<ExerciseInput>,
) -> Result<Json<Exercise>> {
    let input = input.normalized().map_err(AppError::Validation)?;
    if !state.exercise_repo.update(&id, &auth_user.id, input).await? {
        return Err(not_found());
    }

    let exercise = state
        .exercise_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(exercise))
}

pub async fn delete(
    State(state): State<ExercisesState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.exercise_repo.delete(&id, &auth_user.id).await? {
        return Err(not_found());
    }

    tracing::debug!(exercise_id = %id, "Custom exercise deleted");
    Ok(StatusCode::NO_CONTENT)
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{
    AttachExercises, ReorderExercises, ReplaceExercise, Workout, WorkoutDetail,
    WorkoutHistoryEntry, WorkoutInput, WorkoutSummary,
};
use crate::repositories::{ExerciseRepository, HistoryRepository, WorkoutRepository};

#[derive(Clone)]
pub struct WorkoutsState {
    pub workout_repo: WorkoutRepository,
    pub exercise_repo: ExerciseRepository,
    pub history_repo: HistoryRepository,
}

impl WorkoutsState {
    /// The workout, if it exists and belongs to the caller. Someone else's
    /// workout is indistinguishable from a missing one.
    pub(crate) async fn owned_workout(&self, id: &str, user_id: &str) -> Result<Workout> {
        self.workout_repo
            .find_by_id(id)
            .await?
            .filter(|w| w.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Workout not found".to_string()))
    }

    pub(crate) async fn detail(&self, id: &str) -> Result<WorkoutDetail> {
        self.workout_repo
            .find_detail(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Workout not found".to_string()))
    }

    async fn require_visible_exercise(&self, exercise_id: &str, user_id: &str) -> Result<()> {
        self.exercise_repo
            .find_visible(exercise_id, user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Exercise not found: {}", exercise_id)))
    }
}

fn workout_exercise_not_found() -> AppError {
    AppError::NotFound("Workout exercise not found".to_string())
}

pub async fn list(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
) -> Result<Json<Vec<WorkoutSummary>>> {
    Ok(Json(state.workout_repo.find_by_user(&auth_user.id).await?))
}

pub async fn create(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Json(input): Json<WorkoutInput>,
) -> Result<(StatusCode, Json<Workout>)> {
    let name = input.normalized_name().map_err(AppError::Validation)?;
    let workout = state.workout_repo.create(&auth_user.id, &name).await?;

    tracing::debug!(workout_id = %workout.id, "Workout created");
    Ok((StatusCode::CREATED, Json(workout)))
}

pub async fn show(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<WorkoutDetail>> {
    state.owned_workout(&id, &auth_user.id).await?;
    Ok(Json(state.detail(&id).await?))
}

pub async fn update(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<WorkoutInput>,
) -> Result<Json<WorkoutDetail>> {
    let name = input.normalized_name().map_err(AppError::Validation)?;
    if !state.workout_repo.rename(&id, &auth_user.id, &name).await? {
        return Err(AppError::NotFound("Workout not found".to_string()));
    }
    Ok(Json(state.detail(&id).await?))
}

pub async fn delete(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.workout_repo.delete_cascade(&id, &auth_user.id).await? {
        return Err(AppError::NotFound("Workout not found".to_string()));
    }

    tracing::debug!(workout_id = %id, "Workout deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn attach_exercises(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<AttachExercises>,
) -> Result<(StatusCode, Json<WorkoutDetail>)> {
    state.owned_workout(&id, &auth_user.id).await?;
    if input.exercise_ids.is_empty() {
        return Err(AppError::Validation(
            "At least one exercise is required".to_string(),
        ));
    }
    for exercise_id in &input.exercise_ids {
        state
            .require_visible_exercise(exercise_id, &auth_user.id)
            .await?;
    }

    state
        .workout_repo
        .attach_exercises(&id, input.exercise_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(state.detail(&id).await?)))
}

pub async fn reorder_exercises(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<ReorderExercises>,
) -> Result<Json<WorkoutDetail>> {
    state.owned_workout(&id, &auth_user.id).await?;
    state
        .workout_repo
        .reorder_exercises(&id, input.workout_exercise_ids)
        .await?;
    Ok(Json(state.detail(&id).await?))
}

/// Swap the exercise of one slot in place. Its logged sets are dropped.
pub async fn replace_exercise(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path((id, workout_exercise_id)): Path<(String, String)>,
    Json(input): Json<ReplaceExercise>,
) -> Result<Json<WorkoutDetail>> {
    state.owned_workout(&id, &auth_user.id).await?;
    state
        .require_visible_exercise(&input.exercise_id, &auth_user.id)
        .await?;

    if !state
        .workout_repo
        .replace_exercise(&workout_exercise_id, &id, &input.exercise_id)
        .await?
    {
        return Err(workout_exercise_not_found());
    }
    Ok(Json(state.detail(&id).await?))
}

pub async fn remove_exercise(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path((id, workout_exercise_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.owned_workout(&id, &auth_user.id).await?;
    if !state
        .workout_repo
        .remove_exercise(&workout_exercise_id, &id)
        .await?
    {
        return Err(workout_exercise_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_all_exercises(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.owned_workout(&id, &auth_user.id).await?;
    let removed = state.workout_repo.delete_all_exercises(&id).await?;

    tracing::debug!(workout_id = %id, removed, "Cleared workout exercises");
    Ok(StatusCode::NO_CONTENT)
}

/// Record the completed sets as a history session and reset the workout.
pub async fn complete(
    State(state): State<WorkoutsState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<WorkoutHistoryEntry>)> {
    state.owned_workout(&id, &auth_user.id).await?;

    let entry = state
        .history_repo
        .record_completion(&id, &auth_user.id)
        .await?
        .ok_or_else(|| AppError::BadRequest("No completed sets to record".to_string()))?;

    tracing::info!(
        workout_id = %id,
        session_id = %entry.session_id,
        sets = entry.set_count,
        "Workout completed"
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

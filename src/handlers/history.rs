use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{ExerciseProgress, SetHistory, WorkoutHistoryEntry};
use crate::repositories::HistoryRepository;

pub const PAGE_SIZE: i64 = 20;
pub const EXERCISE_HISTORY_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct HistoryState {
    pub history_repo: HistoryRepository,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

#[derive(Serialize)]
pub struct HistoryPage {
    pub entries: Vec<WorkoutHistoryEntry>,
    pub page: i64,
    pub total_pages: i64,
}

pub async fn list(
    State(state): State<HistoryState>,
    auth_user: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<HistoryPage>> {
    let page = query.page.unwrap_or(1).max(1);
    let total = state.history_repo.count_sessions(&auth_user.id).await?;
    let total_pages = ((total + PAGE_SIZE - 1) / PAGE_SIZE).max(1);

    let entries = state
        .history_repo
        .find_sessions_paginated(&auth_user.id, PAGE_SIZE, (page - 1).saturating_mul(PAGE_SIZE))
        .await?;

    Ok(Json(HistoryPage {
        entries,
        page,
        total_pages,
    }))
}

pub async fn show_session(
    State(state): State<HistoryState>,
    auth_user: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<SetHistory>>> {
    let rows = state
        .history_repo
        .find_session(&auth_user.id, &session_id)
        .await?;
    if rows.is_empty() {
        return Err(AppError::NotFound("Session not found".to_string()));
    }
    Ok(Json(rows))
}

pub async fn exercise_progress(
    State(state): State<HistoryState>,
    auth_user: AuthUser,
    Path(exercise_id): Path<String>,
) -> Result<Json<ExerciseProgress>> {
    let entries = state
        .history_repo
        .find_by_exercise(&auth_user.id, &exercise_id, EXERCISE_HISTORY_LIMIT)
        .await?;
    Ok(Json(ExerciseProgress::from_entries(&exercise_id, entries)))
}

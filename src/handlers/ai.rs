use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::workout::validate_workout_name;
use crate::models::WorkoutDetail;
use crate::repositories::{ExerciseRepository, UserRepository, WorkoutRepository};
use crate::services::coach::{self, ChatRequest, GenerateWorkoutRequest};
use crate::services::llm::LlmClient;

#[derive(Clone)]
pub struct AiState {
    pub user_repo: UserRepository,
    pub exercise_repo: ExerciseRepository,
    pub workout_repo: WorkoutRepository,
    pub llm: Option<Arc<dyn LlmClient>>,
}

#[derive(Serialize)]
pub struct ChatReply {
    pub reply: String,
}

impl AiState {
    /// The configured model, provided the caller has premium access.
    async fn client_for(&self, auth_user: &AuthUser) -> Result<&Arc<dyn LlmClient>> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| AppError::ServiceUnavailable("AI coaching is not configured".to_string()))?;

        let user = self
            .user_repo
            .find_by_id(&auth_user.id)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if !user.is_premium {
            return Err(AppError::Forbidden(
                "AI coaching requires a premium subscription".to_string(),
            ));
        }
        Ok(llm)
    }
}

pub async fn chat(
    State(state): State<AiState>,
    auth_user: AuthUser,
    Json(input): Json<ChatRequest>,
) -> Result<Json<ChatReply>> {
    coach::validate_conversation(&input.messages).map_err(AppError::Validation)?;
    let llm = state.client_for(&auth_user).await?;

    let reply = llm.complete(coach::chat_prompt(input.messages), false).await?;
    Ok(Json(ChatReply {
        reply: reply.trim().to_string(),
    }))
}

pub async fn generate_workout(
    State(state): State<AiState>,
    auth_user: AuthUser,
    Json(input): Json<GenerateWorkoutRequest>,
) -> Result<(StatusCode, Json<WorkoutDetail>)> {
    input.validate().map_err(AppError::Validation)?;
    let llm = state.client_for(&auth_user).await?;

    let library = state.exercise_repo.library_for_user(&auth_user.id).await?;
    let names: Vec<String> = library.iter().map(|(_, name)| name.clone()).collect();

    let reply = llm
        .complete(coach::generation_prompt(&input, &names), true)
        .await?;
    let plan = coach::parse_generated_workout(&reply).ok_or_else(|| {
        AppError::Upstream("The coach returned an unreadable workout plan".to_string())
    })?;

    let matched = coach::match_plan(&plan, &library);
    if matched.is_empty() {
        return Err(AppError::Upstream(
            "The coach did not suggest any known exercises".to_string(),
        ));
    }

    let name = plan
        .name
        .as_deref()
        .and_then(|n| validate_workout_name(n).ok())
        .or_else(|| {
            let fallback: String = input.goal.trim().chars().take(100).collect();
            validate_workout_name(&fallback).ok()
        })
        .unwrap_or_else(|| "Generated workout".to_string());

    let detail = state
        .workout_repo
        .create_with_plan(&auth_user.id, &name, matched)
        .await?;

    tracing::info!(
        user_id = %auth_user.id,
        workout_id = %detail.workout.id,
        exercises = detail.exercises.len(),
        "Generated workout"
    );
    Ok((StatusCode::CREATED, Json(detail)))
}

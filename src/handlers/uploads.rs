use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::services::storage::{PresignedUpload, StorageService};

#[derive(Clone)]
pub struct UploadsState {
    pub storage: Option<StorageService>,
}

#[derive(Deserialize)]
pub struct AvatarUploadRequest {
    pub content_type: String,
}

/// Hand out a presigned PUT URL for a new avatar object. The client
/// confirms the upload afterwards with `PUT /users/me/avatar`.
pub async fn avatar(
    State(state): State<UploadsState>,
    auth_user: AuthUser,
    Json(input): Json<AvatarUploadRequest>,
) -> Result<Json<PresignedUpload>> {
    let storage = state
        .storage
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Uploads are not configured".to_string()))?;

    let object_key = StorageService::avatar_key(&auth_user.id, &input.content_type)
        .ok_or_else(|| {
            AppError::Validation(
                "Content type must be image/jpeg, image/png, image/webp or image/heic".to_string(),
            )
        })?;

    tracing::debug!(user_id = %auth_user.id, %object_key, "Presigning avatar upload");
    Ok(Json(storage.presign_put(&object_key, Utc::now())))
}

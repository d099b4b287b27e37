use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::User;
use crate::repositories::UserRepository;
use crate::session::remove_refresh_cookie;

#[derive(Clone)]
pub struct UsersState {
    pub user_repo: UserRepository,
}

#[derive(Deserialize)]
pub struct SetAvatar {
    pub object_key: String,
}

async fn current_user(state: &UsersState, auth_user: &AuthUser) -> Result<User> {
    // A valid token for a deleted account.
    state
        .user_repo
        .find_by_id(&auth_user.id)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn me(State(state): State<UsersState>, auth_user: AuthUser) -> Result<Json<User>> {
    Ok(Json(current_user(&state, &auth_user).await?))
}

pub async fn set_avatar(
    State(state): State<UsersState>,
    auth_user: AuthUser,
    Json(input): Json<SetAvatar>,
) -> Result<Json<User>> {
    let user = current_user(&state, &auth_user).await?;
    let object_key = input.object_key.trim();

    if !object_key.starts_with(&user.avatar_prefix()) || object_key.contains("..") {
        return Err(AppError::Forbidden(
            "Avatar must be uploaded under your own prefix".to_string(),
        ));
    }

    state.user_repo.set_avatar_key(&user.id, object_key).await?;
    Ok(Json(User {
        avatar_key: Some(object_key.to_string()),
        ..user
    }))
}

pub async fn delete_account(
    State(state): State<UsersState>,
    auth_user: AuthUser,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    if !state.user_repo.delete_cascade(&auth_user.id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %auth_user.id, "Account deleted");
    Ok((jar.add(remove_refresh_cookie()), StatusCode::NO_CONTENT))
}

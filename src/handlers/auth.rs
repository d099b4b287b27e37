use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::jwt::JwtManager;
use crate::models::user::normalize_email;
use crate::models::{LoginCredentials, RegisterUser, User};
use crate::repositories::UserRepository;
use crate::services::email::{verification_email, EmailSender};
use crate::session::{
    create_refresh_cookie, generate_token, get_refresh_token, hash_token, remove_refresh_cookie,
};

#[derive(Clone)]
pub struct AuthState {
    pub user_repo: UserRepository,
    pub jwt: JwtManager,
    pub email: Arc<dyn EmailSender>,
    pub app_base_url: String,
    pub refresh_token_ttl_days: i64,
    pub cookie_secure: bool,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

#[derive(Deserialize)]
pub struct ResendVerification {
    pub email: String,
}

impl AuthState {
    /// Issue a fresh verification token and mail it. Failures are logged only.
    async fn send_verification(&self, user: &User, token: &str) {
        let message = match verification_email(
            &self.app_base_url,
            &user.email,
            user.name.as_deref(),
            token,
        ) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(user_id = %user.id, "Failed to render verification email: {}", e);
                return;
            }
        };

        if let Err(e) = self.email.send(message).await {
            tracing::warn!(user_id = %user.id, "Failed to send verification email: {}", e);
        }
    }

    /// Store a new refresh token for the user and build the login response.
    async fn issue_tokens(
        &self,
        jar: CookieJar,
        user: User,
    ) -> Result<(CookieJar, Json<TokenResponse>)> {
        let refresh_token = generate_token();
        self.user_repo
            .set_refresh_token_hash(&user.id, Some(&hash_token(&refresh_token)))
            .await?;
        self.token_response(jar, user, &refresh_token)
    }

    fn token_response(
        &self,
        jar: CookieJar,
        user: User,
        refresh_token: &str,
    ) -> Result<(CookieJar, Json<TokenResponse>)> {
        let access_token = self.jwt.generate_access_token(&user)?;
        let jar = jar.add(create_refresh_cookie(
            refresh_token,
            self.refresh_token_ttl_days,
            self.cookie_secure,
        ));

        Ok((
            jar,
            Json(TokenResponse {
                access_token,
                token_type: "Bearer",
                expires_in: self.jwt.access_token_ttl_secs(),
                user,
            }),
        ))
    }
}

pub async fn register(
    State(state): State<AuthState>,
    Json(input): Json<RegisterUser>,
) -> Result<(StatusCode, Json<User>)> {
    input.validate().map_err(AppError::Validation)?;

    let name = input
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let (user, token) = state
        .user_repo
        .create(&input.email, name, &input.password)
        .await?;

    tracing::info!(user_id = %user.id, "User registered");
    state.send_verification(&user, &token).await;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn verify_email(
    State(state): State<AuthState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<User>> {
    let user = state
        .user_repo
        .verify_email(query.token.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("Verification token not found".to_string()))?;

    tracing::info!(user_id = %user.id, "Email verified");
    Ok(Json(user))
}

/// Always 202 so the endpoint cannot be used to probe for accounts.
pub async fn resend_verification(
    State(state): State<AuthState>,
    Json(input): Json<ResendVerification>,
) -> Result<StatusCode> {
    let email = normalize_email(&input.email);
    if let Some(user) = state.user_repo.find_by_email(&email).await? {
        if !user.email_verified {
            let token = state.user_repo.reset_verification_token(&user.id).await?;
            state.send_verification(&user, &token).await;
        }
    }
    Ok(StatusCode::ACCEPTED)
}

pub async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(credentials): Json<LoginCredentials>,
) -> Result<(CookieJar, Json<TokenResponse>)> {
    let user = state
        .user_repo
        .verify_password(&credentials.email, &credentials.password)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !user.email_verified {
        return Err(AppError::Forbidden(
            "Email address has not been verified".to_string(),
        ));
    }

    tracing::info!(user_id = %user.id, "User logged in");
    state.issue_tokens(jar, user).await
}

/// Exchange the refresh cookie for a new access token. The refresh token is
/// single use: it is replaced on every call.
pub async fn refresh(State(state): State<AuthState>, jar: CookieJar) -> Response {
    match rotate(&state, jar.clone()).await {
        Ok(response) => response.into_response(),
        Err(e) => (jar.add(remove_refresh_cookie()), e).into_response(),
    }
}

async fn rotate(state: &AuthState, jar: CookieJar) -> Result<(CookieJar, Json<TokenResponse>)> {
    let presented = get_refresh_token(&jar).ok_or(AppError::Unauthorized)?;
    let old_hash = hash_token(&presented);

    let user = state
        .user_repo
        .find_by_refresh_token_hash(&old_hash)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let next = generate_token();
    let rotated = state
        .user_repo
        .rotate_refresh_token_hash(&user.id, &old_hash, &hash_token(&next))
        .await?;
    if !rotated {
        // Lost a race with a concurrent refresh using the same token.
        return Err(AppError::Unauthorized);
    }

    state.token_response(jar, user, &next)
}

pub async fn logout(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    if let Some(token) = get_refresh_token(&jar) {
        if let Some(user) = state
            .user_repo
            .find_by_refresh_token_hash(&hash_token(&token))
            .await?
        {
            state.user_repo.set_refresh_token_hash(&user.id, None).await?;
            tracing::info!(user_id = %user.id, "User logged out");
        }
    }

    Ok((jar.add(remove_refresh_cookie()), StatusCode::NO_CONTENT))
}

use axum::{extract::FromRequestParts, http::header, http::request::Parts};

use crate::error::AppError;
use crate::jwt::JwtManager;

/// The caller, authenticated by a `Bearer` access token.
///
/// Requires the `JwtManager` to be installed as a request extension.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub email_verified: bool,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jwt = parts
            .extensions
            .get::<JwtManager>()
            .ok_or_else(|| AppError::Internal("JWT manager not installed".to_string()))?;

        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let claims = jwt.validate_token(token)?;

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified,
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

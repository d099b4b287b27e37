use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::repositories::UserRepository;
use crate::services::payments::{CheckoutSession, PaymentProvider, WebhookEvent};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Clone)]
pub struct PaymentsState {
    pub user_repo: UserRepository,
    pub payments: Option<Arc<dyn PaymentProvider>>,
}

impl PaymentsState {
    fn provider(&self) -> Result<&Arc<dyn PaymentProvider>> {
        self.payments
            .as_ref()
            .ok_or_else(|| AppError::ServiceUnavailable("Payments are not configured".to_string()))
    }
}

#[derive(Serialize)]
pub struct PremiumStatus {
    pub is_premium: bool,
}

pub async fn checkout(
    State(state): State<PaymentsState>,
    auth_user: AuthUser,
) -> Result<Json<CheckoutSession>> {
    let provider = state.provider()?;
    let user = state
        .user_repo
        .find_by_id(&auth_user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if user.is_premium {
        return Err(AppError::Conflict("Already subscribed".to_string()));
    }

    Ok(Json(provider.create_checkout_session(&user).await?))
}

pub async fn status(
    State(state): State<PaymentsState>,
    auth_user: AuthUser,
) -> Result<Json<PremiumStatus>> {
    let user = state
        .user_repo
        .find_by_id(&auth_user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(PremiumStatus {
        is_premium: user.is_premium,
    }))
}

/// Provider callback. Unauthenticated; trust comes from the signature.
pub async fn webhook(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let provider = state.provider()?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let event = provider.verify_webhook(&body, signature)?;

    match event {
        WebhookEvent::CheckoutCompleted {
            user_id,
            customer_id,
        } => {
            let user = match (user_id, customer_id.as_deref()) {
                (Some(user_id), _) => state.user_repo.find_by_id(&user_id).await?,
                (None, Some(customer_id)) => {
                    state.user_repo.find_by_payment_customer(customer_id).await?
                }
                (None, None) => None,
            };
            match user {
                Some(user) => {
                    state
                        .user_repo
                        .set_premium(&user.id, true, customer_id.as_deref())
                        .await?;
                    tracing::info!(user_id = %user.id, "Premium activated");
                }
                None => tracing::warn!("Checkout completed for an unknown user"),
            }
        }
        WebhookEvent::SubscriptionDeleted { customer_id } => {
            match state.user_repo.find_by_payment_customer(&customer_id).await? {
                Some(user) => {
                    state.user_repo.set_premium(&user.id, false, None).await?;
                    tracing::info!(user_id = %user.id, "Premium cancelled");
                }
                None => tracing::warn!(%customer_id, "Subscription deleted for an unknown customer"),
            }
        }
        WebhookEvent::Ignored(event_type) => {
            tracing::debug!(%event_type, "Ignoring webhook event");
        }
    }

    Ok(Json(json!({ "received": true })))
}

//! Premium subscriptions through Stripe Checkout.
//!
//! Checkout sessions are created with a form-encoded POST. Webhook
//! payloads carry a `Stripe-Signature` header of the form
//! `t=<unix>,v1=<hex hmac>[,v1=...]`, where the HMAC-SHA256 covers
//! `"<t>.<raw body>"`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

use crate::error::{AppError, Result};
use crate::models::User;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a webhook timestamp, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub price_id: String,
    pub api_base: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

/// The subset of webhook events that change account state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    CheckoutCompleted {
        user_id: Option<String>,
        customer_id: Option<String>,
    },
    SubscriptionDeleted {
        customer_id: String,
    },
    Ignored(String),
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(&self, user: &User) -> Result<CheckoutSession>;

    /// Authenticate and decode a webhook delivery.
    fn verify_webhook(&self, payload: &[u8], signature_header: Option<&str>)
        -> Result<WebhookEvent>;
}

pub struct StripeClient {
    client: reqwest::Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(client: reqwest::Client, config: StripeConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Deserialize)]
struct StripeCheckoutResponse {
    id: String,
    url: Option<String>,
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(&self, user: &User) -> Result<CheckoutSession> {
        let mut form = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", self.config.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", self.config.success_url.clone()),
            ("cancel_url", self.config.cancel_url.clone()),
            ("client_reference_id", user.id.clone()),
        ];
        match &user.payment_customer_id {
            Some(customer) => form.push(("customer", customer.clone())),
            None => form.push(("customer_email", user.email.clone())),
        }

        let response = self
            .client
            .post(format!(
                "{}/v1/checkout/sessions",
                self.config.api_base.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Payment provider returned {}: {}",
                status, body
            )));
        }

        let session: StripeCheckoutResponse = response.json().await?;
        let url = session
            .url
            .ok_or_else(|| AppError::Upstream("Checkout session has no URL".to_string()))?;

        tracing::info!(user_id = %user.id, session_id = %session.id, "Checkout session created");
        Ok(CheckoutSession {
            session_id: session.id,
            url,
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookEvent> {
        verify_webhook_signature(
            payload,
            signature_header,
            &self.config.webhook_secret,
            Utc::now(),
            WEBHOOK_TOLERANCE_SECS,
        )?;
        parse_webhook_event(payload)
    }
}

/// Compute the `v1` signature for a payload. Also used to sign test fixtures.
pub fn sign_webhook_payload(payload: &[u8], timestamp: i64, secret: &str) -> String {
    let mut mac = new_mac(secret);
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: Option<&str>,
    secret: &str,
    now: DateTime<Utc>,
    tolerance_secs: i64,
) -> Result<()> {
    let invalid = || AppError::BadRequest("Invalid webhook signature".to_string());
    let header = signature_header.ok_or_else(invalid)?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(invalid)?;
    if (now.timestamp() - timestamp).abs() > tolerance_secs {
        tracing::warn!(timestamp, "Webhook timestamp outside tolerance");
        return Err(invalid());
    }

    let mut mac = new_mac(secret);
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(invalid())
    }
}

pub fn parse_webhook_event(payload: &[u8]) -> Result<WebhookEvent> {
    let event: Value = serde_json::from_slice(payload)
        .map_err(|_| AppError::BadRequest("Malformed webhook payload".to_string()))?;
    let event_type = event["type"].as_str().unwrap_or_default().to_string();
    let object = &event["data"]["object"];
    let string_field = |name: &str| object[name].as_str().map(str::to_string);

    Ok(match event_type.as_str() {
        "checkout.session.completed" => WebhookEvent::CheckoutCompleted {
            user_id: string_field("client_reference_id"),
            customer_id: string_field("customer"),
        },
        "customer.subscription.deleted" => match string_field("customer") {
            Some(customer_id) => WebhookEvent::SubscriptionDeleted { customer_id },
            None => WebhookEvent::Ignored(event_type),
        },
        _ => WebhookEvent::Ignored(event_type),
    })
}

fn new_mac(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length.
    HmacSha256::new_from_slice(secret.as_bytes()).unwrap_or_else(|_| unreachable!())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    const SECRET: &str = "whsec_test";

    fn header_for(payload: &[u8], timestamp: i64) -> String {
        format!("t={},v1={}", timestamp, sign_webhook_payload(payload, timestamp, SECRET))
    }

    #[test]
    fn test_valid_signature_is_accepted() {
        let payload = br#"{"type":"ping"}"#;
        let now = Utc::now();
        let header = header_for(payload, now.timestamp());

        assert_ok!(verify_webhook_signature(payload, Some(&header), SECRET, now, 300));
    }

    #[test]
    fn test_any_matching_v1_is_accepted() {
        let payload = br#"{"type":"ping"}"#;
        let now = Utc::now();
        let ts = now.timestamp();
        let header = format!(
            "t={},v1={},v1={}",
            ts,
            "00".repeat(32),
            sign_webhook_payload(payload, ts, SECRET)
        );

        assert!(verify_webhook_signature(payload, Some(&header), SECRET, now, 300).is_ok());
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let now = Utc::now();
        let header = header_for(br#"{"type":"ping"}"#, now.timestamp());

        let result = verify_webhook_signature(br#"{"type":"pong"}"#, Some(&header), SECRET, now, 300);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let payload = br#"{"type":"ping"}"#;
        let now = Utc::now();
        let header = header_for(payload, now.timestamp() - 301);

        assert_err!(verify_webhook_signature(payload, Some(&header), SECRET, now, 300));
    }

    #[test]
    fn test_missing_or_garbled_header_is_rejected() {
        let payload = b"{}";
        let now = Utc::now();

        assert_err!(verify_webhook_signature(payload, None, SECRET, now, 300));
        assert_err!(verify_webhook_signature(payload, Some("v1=abc"), SECRET, now, 300));
        assert_err!(verify_webhook_signature(payload, Some("t=abc,v1=zz"), SECRET, now, 300));
    }

    #[test]
    fn test_parse_checkout_completed() {
        let payload = br#"{"type":"checkout.session.completed","data":{"object":{"client_reference_id":"user-1","customer":"cus_123"}}}"#;

        assert_eq!(
            parse_webhook_event(payload).unwrap(),
            WebhookEvent::CheckoutCompleted {
                user_id: Some("user-1".to_string()),
                customer_id: Some("cus_123".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_subscription_deleted() {
        let payload = br#"{"type":"customer.subscription.deleted","data":{"object":{"customer":"cus_123"}}}"#;

        assert_eq!(
            parse_webhook_event(payload).unwrap(),
            WebhookEvent::SubscriptionDeleted {
                customer_id: "cus_123".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unknown_event_is_ignored() {
        let payload = br#"{"type":"invoice.paid","data":{"object":{}}}"#;

        assert_eq!(
            parse_webhook_event(payload).unwrap(),
            WebhookEvent::Ignored("invoice.paid".to_string())
        );
        assert!(parse_webhook_event(b"not json").is_err());
    }
}

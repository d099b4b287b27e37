//! Transactional email.
//!
//! Messages are rendered from askama templates and delivered through an
//! HTTP email API (Resend-compatible). Without credentials the sender only
//! logs, which keeps local development usable.

use askama::Template;
use async_trait::async_trait;
use serde_json::json;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_key: String,
    pub api_url: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

#[derive(Template)]
#[template(path = "email/verify.html")]
struct VerifyEmailHtml<'a> {
    greeting: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/verify.txt")]
struct VerifyEmailText<'a> {
    greeting: &'a str,
    link: &'a str,
}

/// Build the verification email for a freshly issued token.
pub fn verification_email(
    base_url: &str,
    to: &str,
    name: Option<&str>,
    token: &str,
) -> Result<EmailMessage> {
    let link = format!(
        "{}/auth/verify?token={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(token)
    );
    let greeting = match name {
        Some(name) => format!("Hi {}", name),
        None => "Hi".to_string(),
    };

    let html = VerifyEmailHtml {
        greeting: &greeting,
        link: &link,
    }
    .render()
    .map_err(|e| AppError::Internal(e.to_string()))?;
    let text = VerifyEmailText {
        greeting: &greeting,
        link: &link,
    }
    .render()
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(EmailMessage {
        to: to.to_string(),
        subject: "Verify your email".to_string(),
        html,
        text,
    })
}

pub struct HttpEmailSender {
    client: reqwest::Client,
    config: EmailConfig,
}

impl HttpEmailSender {
    pub fn new(client: reqwest::Client, config: EmailConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "from": self.config.from,
                "to": [message.to],
                "subject": message.subject,
                "html": message.html,
                "text": message.text,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Email API returned {}: {}",
                status, body
            )));
        }

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// Stand-in used when no email API is configured.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Email delivery disabled; message body follows\n{}",
            message.text
        );
        Ok(())
    }
}

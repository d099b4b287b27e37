use std::env;

use crate::services::email::EmailConfig;
use crate::services::llm::LlmConfig;
use crate::services::payments::StripeConfig;
use crate::services::storage::StorageConfig;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Public URL of this API, used in emailed links.
    pub app_base_url: String,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub cookie_secure: bool,
    pub cors_allowed_origins: String,
    pub auth_rate_limit: u32,
    pub ai_rate_limit: u32,
    pub rate_limit_window_secs: u64,
    pub email: Option<EmailConfig>,
    pub storage: Option<StorageConfig>,
    pub stripe: Option<StripeConfig>,
    pub llm: Option<LlmConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let app_base_url = var_or("APP_BASE_URL", "http://127.0.0.1:3000");

        Ok(Self {
            database_url: var_or("DATABASE_URL", "sqlite:repcount.db?mode=rwc"),
            host: var_or("HOST", "127.0.0.1"),
            port: parse_or("PORT", 3000),
            jwt_secret: env::var("JWT_SECRET")?,
            access_token_ttl_minutes: parse_or("ACCESS_TOKEN_TTL_MINUTES", 15),
            refresh_token_ttl_days: parse_or("REFRESH_TOKEN_TTL_DAYS", 30),
            cookie_secure: parse_or("COOKIE_SECURE", false),
            cors_allowed_origins: var_or("CORS_ALLOWED_ORIGINS", "*"),
            auth_rate_limit: parse_or("AUTH_RATE_LIMIT", 20),
            ai_rate_limit: parse_or("AI_RATE_LIMIT", 10),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW_SECS", 60),
            email: email_from_env(),
            storage: storage_from_env(),
            stripe: stripe_from_env(&app_base_url),
            llm: llm_from_env(),
            app_base_url,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// A non-empty variable, or `None`.
fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn email_from_env() -> Option<EmailConfig> {
    Some(EmailConfig {
        api_key: optional("EMAIL_API_KEY")?,
        api_url: var_or("EMAIL_API_URL", "https://api.resend.com/emails"),
        from: var_or("EMAIL_FROM", "Repcount <no-reply@repcount.app>"),
    })
}

fn storage_from_env() -> Option<StorageConfig> {
    Some(StorageConfig {
        bucket: optional("STORAGE_BUCKET")?,
        region: var_or("STORAGE_REGION", "us-east-1"),
        endpoint: optional("STORAGE_ENDPOINT"),
        access_key_id: optional("STORAGE_ACCESS_KEY_ID")?,
        secret_access_key: optional("STORAGE_SECRET_ACCESS_KEY")?,
        upload_url_ttl_secs: parse_or("UPLOAD_URL_TTL_SECS", 900),
    })
}

fn stripe_from_env(app_base_url: &str) -> Option<StripeConfig> {
    Some(StripeConfig {
        secret_key: optional("STRIPE_SECRET_KEY")?,
        webhook_secret: optional("STRIPE_WEBHOOK_SECRET")?,
        price_id: optional("STRIPE_PRICE_ID")?,
        api_base: var_or("STRIPE_API_BASE", "https://api.stripe.com"),
        success_url: var_or(
            "STRIPE_SUCCESS_URL",
            &format!("{}/payments/success", app_base_url),
        ),
        cancel_url: var_or(
            "STRIPE_CANCEL_URL",
            &format!("{}/payments/cancel", app_base_url),
        ),
    })
}

fn llm_from_env() -> Option<LlmConfig> {
    Some(LlmConfig {
        api_key: optional("LLM_API_KEY")?,
        api_url: var_or("LLM_API_URL", "https://api.openai.com/v1"),
        model: var_or("LLM_MODEL", "gpt-4o-mini"),
    })
}

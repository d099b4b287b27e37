#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use repcount::db::{create_memory_pool, DbPool};
use repcount::error::{AppError, Result};
use repcount::handlers::{
    ai, auth, exercises, health, history, payments, uploads, users, workouts,
};
use repcount::jwt::{JwtConfig, JwtManager};
use repcount::middleware::RateLimiter;
use repcount::migrations::run_migrations_for_tests;
use repcount::models::User;
use repcount::repositories::{
    ExerciseRepository, HistoryRepository, UserRepository, WorkoutRepository,
};
use repcount::routes::{create_router, AppStates, RateLimits};
use repcount::services::email::{EmailMessage, EmailSender};
use repcount::services::llm::{ChatMessage, LlmClient};
use repcount::services::payments::{
    parse_webhook_event, verify_webhook_signature, CheckoutSession, PaymentProvider,
    WebhookEvent, WEBHOOK_TOLERANCE_SECS,
};
use repcount::services::storage::{StorageConfig, StorageService};

pub const TEST_PASSWORD: &str = "password123";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

pub fn setup_test_db() -> DbPool {
    let pool = create_memory_pool().expect("Failed to create test database");
    run_migrations_for_tests(&pool).expect("Failed to run migrations");
    pool
}

pub fn test_jwt() -> JwtManager {
    JwtManager::new(JwtConfig {
        secret: "test-secret".to_string(),
        access_token_ttl: chrono::Duration::minutes(15),
        issuer: "repcount".to_string(),
    })
}

/// Captures outgoing email instead of delivering it.
#[derive(Default)]
pub struct RecordingEmailSender {
    pub sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailSender {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Token from the verification link of the most recent email.
    pub fn last_token(&self) -> Option<String> {
        let messages = self.messages();
        let text = &messages.last()?.text;
        let start = text.find("token=")? + "token=".len();
        Some(
            text[start..]
                .chars()
                .take_while(|c| c.is_ascii_hexdigit())
                .collect(),
        )
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Returns queued replies in order and records every prompt.
#[derive(Default)]
pub struct ScriptedLlm {
    pub replies: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn push_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(reply.to_string());
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, messages: Vec<ChatMessage>, _json_mode: bool) -> Result<String> {
        self.prompts.lock().unwrap().push(messages);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Upstream("No scripted reply".to_string()))
    }
}

/// Checkout without network; webhooks verified with the real signature check.
pub struct FakePayments;

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_checkout_session(&self, user: &User) -> Result<CheckoutSession> {
        Ok(CheckoutSession {
            session_id: format!("cs_test_{}", user.id),
            url: "https://checkout.example.com/pay".to_string(),
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
            TEST_WEBHOOK_SECRET,
            chrono::Utc::now(),
            WEBHOOK_TOLERANCE_SECS,
        )?;
        parse_webhook_event(payload)
    }
}

pub fn test_storage() -> StorageService {
    StorageService::new(StorageConfig {
        bucket: "repcount-test".to_string(),
        region: "us-east-1".to_string(),
        endpoint: Some("http://localhost:9000".to_string()),
        access_key_id: "test-key".to_string(),
        secret_access_key: "test-secret".to_string(),
        upload_url_ttl_secs: 900,
    })
}

pub struct TestOptions {
    pub storage: bool,
    pub payments: bool,
    pub llm: bool,
    pub auth_rate_limit: u32,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            storage: true,
            payments: true,
            llm: true,
            auth_rate_limit: 1000,
        }
    }
}

pub struct TestApp {
    pub pool: DbPool,
    pub router: Router,
    pub jwt: JwtManager,
    pub emails: Arc<RecordingEmailSender>,
    pub llm: Arc<ScriptedLlm>,
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(TestOptions::default())
}

pub fn create_test_app_with(options: TestOptions) -> TestApp {
    let pool = setup_test_db();
    let jwt = test_jwt();
    let emails = Arc::new(RecordingEmailSender::default());
    let llm = Arc::new(ScriptedLlm::default());

    let user_repo = UserRepository::new(pool.clone());
    let exercise_repo = ExerciseRepository::new(pool.clone());
    let workout_repo = WorkoutRepository::new(pool.clone());
    let history_repo = HistoryRepository::new(pool.clone());

    let states = AppStates {
        health: health::HealthState { pool: pool.clone() },
        auth: auth::AuthState {
            user_repo: user_repo.clone(),
            jwt: jwt.clone(),
            email: emails.clone(),
            app_base_url: "http://localhost:3000".to_string(),
            refresh_token_ttl_days: 30,
            cookie_secure: false,
        },
        users: users::UsersState {
            user_repo: user_repo.clone(),
        },
        exercises: exercises::ExercisesState {
            exercise_repo: exercise_repo.clone(),
        },
        workouts: workouts::WorkoutsState {
            workout_repo: workout_repo.clone(),
            exercise_repo: exercise_repo.clone(),
            history_repo: history_repo.clone(),
        },
        history: history::HistoryState { history_repo },
        uploads: uploads::UploadsState {
            storage: options.storage.then(test_storage),
        },
        payments: payments::PaymentsState {
            user_repo: user_repo.clone(),
            payments: options
                .payments
                .then(|| Arc::new(FakePayments) as Arc<dyn PaymentProvider>),
        },
        ai: ai::AiState {
            user_repo,
            exercise_repo,
            workout_repo,
            llm: options
                .llm
                .then(|| llm.clone() as Arc<dyn LlmClient>),
        },
    };
    let limits = RateLimits {
        auth: RateLimiter::new(options.auth_rate_limit, 60),
        ai: RateLimiter::new(1000, 60),
    };

    TestApp {
        router: create_router(states, jwt.clone(), limits, "*"),
        pool,
        jwt,
        emails,
        llm,
    }
}

impl TestApp {
    /// A registered, verified user and a bearer token for them.
    pub async fn verified_user(&self, email: &str) -> (User, String) {
        let repo = UserRepository::new(self.pool.clone());
        let (user, token) = repo.create(email, Some("Test"), TEST_PASSWORD).await.unwrap();
        let user = repo.verify_email(&token).await.unwrap().unwrap();
        let access = self.jwt.generate_access_token(&user).unwrap();
        (user, access)
    }

    pub async fn make_premium(&self, user_id: &str) {
        UserRepository::new(self.pool.clone())
            .set_premium(user_id, true, Some("cus_test"))
            .await
            .unwrap();
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(token), None).await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// All `Set-Cookie` values.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }

    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

pub fn extract_cookie_header(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or("").to_string()
}

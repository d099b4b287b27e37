use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repcount::config::Config;
use repcount::db;
use repcount::handlers::{
    ai, auth, exercises, health, history, payments, uploads, users, workouts,
};
use repcount::jwt::{JwtConfig, JwtManager};
use repcount::middleware::RateLimiter;
use repcount::migrations::run_migrations;
use repcount::repositories::{
    ExerciseRepository, HistoryRepository, UserRepository, WorkoutRepository,
};
use repcount::routes::{self, AppStates, RateLimits};
use repcount::services::{
    EmailSender, HttpEmailSender, LlmClient, LogEmailSender, OpenAiClient, PaymentProvider,
    StorageService, StripeClient,
};
use repcount::version::GIT_VERSION;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repcount=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("JWT_SECRET must be set: {}", e))?;

    tracing::info!(version = GIT_VERSION, "Starting repcount");
    tracing::info!("Connecting to database: {}", config.database_url);

    let pool = db::create_pool(&config.database_url)?;
    run_migrations(&pool)?;

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()?;

    let email: Arc<dyn EmailSender> = match config.email.clone() {
        Some(email) => Arc::new(HttpEmailSender::new(http.clone(), email)),
        None => {
            tracing::warn!("EMAIL_API_KEY not set; emails will only be logged");
            Arc::new(LogEmailSender)
        }
    };
    let storage = config.storage.clone().map(StorageService::new);
    if storage.is_none() {
        tracing::warn!("Object storage not configured; avatar uploads disabled");
    }
    let payments_provider = config.stripe.clone().map(|stripe| {
        Arc::new(StripeClient::new(http.clone(), stripe)) as Arc<dyn PaymentProvider>
    });
    if payments_provider.is_none() {
        tracing::warn!("Stripe not configured; payments disabled");
    }
    let llm = config
        .llm
        .clone()
        .map(|llm| Arc::new(OpenAiClient::new(http.clone(), llm)) as Arc<dyn LlmClient>);
    if llm.is_none() {
        tracing::warn!("LLM not configured; AI coaching disabled");
    }

    let jwt = JwtManager::new(JwtConfig {
        secret: config.jwt_secret.clone(),
        access_token_ttl: chrono::Duration::minutes(config.access_token_ttl_minutes),
        issuer: "repcount".to_string(),
    });

    let user_repo = UserRepository::new(pool.clone());
    let exercise_repo = ExerciseRepository::new(pool.clone());
    let workout_repo = WorkoutRepository::new(pool.clone());
    let history_repo = HistoryRepository::new(pool.clone());

    let states = AppStates {
        health: health::HealthState { pool: pool.clone() },
        auth: auth::AuthState {
            user_repo: user_repo.clone(),
            jwt: jwt.clone(),
            email,
            app_base_url: config.app_base_url.clone(),
            refresh_token_ttl_days: config.refresh_token_ttl_days,
            cookie_secure: config.cookie_secure,
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
        uploads: uploads::UploadsState { storage },
        payments: payments::PaymentsState {
            user_repo: user_repo.clone(),
            payments: payments_provider,
        },
        ai: ai::AiState {
            user_repo,
            exercise_repo,
            workout_repo,
            llm,
        },
    };
    let limits = RateLimits {
        auth: RateLimiter::new(config.auth_rate_limit, config.rate_limit_window_secs),
        ai: RateLimiter::new(config.ai_rate_limit, config.rate_limit_window_secs),
    };

    let app = routes::create_router(states, jwt, limits, &config.cors_allowed_origins);

    let addr = config.server_addr();
    tracing::info!("Starting server at http://{}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

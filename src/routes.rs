use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Extension, Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    ai, auth, exercises, health, history, payments, sets, uploads, users, workouts,
};
use crate::jwt::JwtManager;
use crate::middleware::{rate_limit, setup_cors, RateLimiter};

/// Per-module handler states.
#[derive(Clone)]
pub struct AppStates {
    pub health: health::HealthState,
    pub auth: auth::AuthState,
    pub users: users::UsersState,
    pub exercises: exercises::ExercisesState,
    pub workouts: workouts::WorkoutsState,
    pub history: history::HistoryState,
    pub uploads: uploads::UploadsState,
    pub payments: payments::PaymentsState,
    pub ai: ai::AiState,
}

#[derive(Clone)]
pub struct RateLimits {
    pub auth: RateLimiter,
    pub ai: RateLimiter,
}

pub fn create_router(
    states: AppStates,
    jwt: JwtManager,
    limits: RateLimits,
    cors_allowed_origins: &str,
) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/verify", get(auth::verify_email))
        .route("/auth/resend-verification", post(auth::resend_verification))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .with_state(states.auth)
        .layer(from_fn_with_state(limits.auth, rate_limit));

    let ai_routes = Router::new()
        .route("/ai/chat", post(ai::chat))
        .route("/ai/generate-workout", post(ai::generate_workout))
        .with_state(states.ai)
        .layer(from_fn_with_state(limits.ai, rate_limit));

    let workout_routes = Router::new()
        .route("/workouts", get(workouts::list).post(workouts::create))
        .route(
            "/workouts/{id}",
            get(workouts::show)
                .put(workouts::update)
                .delete(workouts::delete),
        )
        .route(
            "/workouts/{id}/exercises",
            post(workouts::attach_exercises).delete(workouts::remove_all_exercises),
        )
        .route(
            "/workouts/{id}/exercises/order",
            put(workouts::reorder_exercises),
        )
        .route(
            "/workouts/{id}/exercises/{workout_exercise_id}",
            put(workouts::replace_exercise).delete(workouts::remove_exercise),
        )
        .route(
            "/workouts/{id}/exercises/{workout_exercise_id}/sets",
            post(sets::create),
        )
        .route("/workouts/{id}/sets", delete(sets::delete_all))
        .route(
            "/workouts/{id}/sets/{set_id}",
            put(sets::replace).delete(sets::delete),
        )
        .route("/workouts/{id}/complete", post(workouts::complete))
        .with_state(states.workouts);

    let user_routes = Router::new()
        .route("/users/me", get(users::me).delete(users::delete_account))
        .route("/users/me/avatar", put(users::set_avatar))
        .with_state(states.users);

    let exercise_routes = Router::new()
        .route("/exercises", get(exercises::list).post(exercises::create))
        .route("/exercises/categories", get(exercises::categories))
        .route(
            "/exercises/{id}",
            get(exercises::show)
                .put(exercises::update)
                .delete(exercises::delete),
        )
        .with_state(states.exercises);

    let history_routes = Router::new()
        .route("/history", get(history::list))
        .route(
            "/history/exercises/{exercise_id}",
            get(history::exercise_progress),
        )
        .route("/history/{session_id}", get(history::show_session))
        .with_state(states.history);

    let payment_routes = Router::new()
        .route("/payments/checkout", post(payments::checkout))
        .route("/payments/status", get(payments::status))
        .route("/payments/webhook", post(payments::webhook))
        .with_state(states.payments);

    Router::new()
        .route("/health", get(health::health_check))
        .with_state(states.health)
        .merge(auth_routes)
        .merge(user_routes)
        .merge(exercise_routes)
        .merge(workout_routes)
        .merge(history_routes)
        .route("/uploads/avatar", post(uploads::avatar).with_state(states.uploads))
        .merge(payment_routes)
        .merge(ai_routes)
        .layer(Extension(jwt))
        .layer(setup_cors(cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
}

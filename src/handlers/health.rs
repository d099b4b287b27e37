use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::db::{with_conn, DbPool};
use crate::version::GIT_VERSION;

#[derive(Clone)]
pub struct HealthState {
    pub pool: DbPool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    git_version: &'static str,
}

/// Liveness plus a trivial database round trip.
pub async fn health_check(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = with_conn(&state.pool, |conn| {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    })
    .await
    .is_ok();

    if !database_ok {
        tracing::error!("Health check failed: database unreachable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unavailable",
                git_version: GIT_VERSION,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            git_version: GIT_VERSION,
        }),
    )
}

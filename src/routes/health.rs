use axum::{extract::State, routing::get, Json, Router};

use crate::db;
use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_ok = db::health_check(&state.pool).await;

    Json(HealthResponse {
        status: if database_ok { "ok" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database: if database_ok { "connected" } else { "unavailable" }.to_string(),
        redis: state.config.redis.enabled.then(|| "enabled".to_string()),
    })
}

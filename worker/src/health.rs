use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use job_queue::{JobStore, QueueName};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub job_store: JobStore,
    pub metrics: Arc<Metrics>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "worker",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let redis_ok = state.job_store.queue_len(QueueName::Ready).await.is_ok();

    if db_ok && redis_ok {
        (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ready", "database": db_ok, "redis": redis_ok})),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "not_ready", "database": db_ok, "redis": redis_ok})),
        )
    }
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    for queue in [
        QueueName::Ready,
        QueueName::Processing,
        QueueName::Failed,
        QueueName::Delayed,
    ] {
        if let Ok(len) = state.job_store.queue_len(queue).await {
            let label = match queue {
                QueueName::Ready => "ready",
                QueueName::Processing => "processing",
                QueueName::Failed => "failed",
                QueueName::Delayed => "delayed",
            };
            state
                .metrics
                .queue_depth
                .with_label_values(&[label])
                .set(len as i64);
        }
    }

    state.metrics.encode()
}

//! 健康检查

use axum::{extract::State, http::StatusCode, response::Json};
use tracing::warn;

use crate::app::AppState;
use crate::infrastructure::database::Connector;
use crate::web::response::HealthResponse;

/// GET /health：只有存活探测成功时才报告健康
pub async fn health_check<C: Connector>(
    State(state): State<AppState<C>>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::ok())),
        Err(err) => {
            warn!(error = %err, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse::db_down()))
        }
    }
}

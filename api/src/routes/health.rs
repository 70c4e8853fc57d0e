//! Health Check Endpoint
//!
//! 프로세스 생존 여부와 저장소 연결 상태를 함께 보고함.
//! 저장소에 닿지 않으면 200은 유지하되 status를 "degraded"로 표시.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// Health check 응답
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: StoreStatus,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct StoreStatus {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// GET /health
pub async fn health_check(
    State(state): State<AppState>,
) -> Json<HealthResponse> {
    let started = std::time::Instant::now();
    let store_status = match state.store.health_check().await {
        Ok(_) => StoreStatus {
            connected: true,
            latency_ms: Some(started.elapsed().as_millis() as u64),
        },
        Err(e) => {
            tracing::warn!("Store health check failed: {:?}", e);
            StoreStatus {
                connected: false,
                latency_ms: None,
            }
        }
    };

    Json(HealthResponse {
        status: if store_status.connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store_status,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

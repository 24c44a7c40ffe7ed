//! 健康检查接口

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(api_health))
}

#[derive(Debug, Serialize)]
pub struct ActorHealth {
    pub rate_limiter: bool,
    pub service_status: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" 或 "degraded"
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub actors: ActorHealth,
}

async fn api_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let actors = ActorHealth {
        rate_limiter: state.geo.get_rate_limiter().health_check().await,
        service_status: state.system.get_status().health_check().await,
    };
    let status = if actors.rate_limiter && actors.service_status {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.system.uptime_secs(),
        actors,
    })
}

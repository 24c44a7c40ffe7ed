//! 首页实时统计接口

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::models::LiveStats;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/stats/live", get(live_stats))
}

/// 当前时刻的在线人数、今日请求数与成交数
async fn live_stats(State(state): State<AppState>) -> Json<LiveStats> {
    let engine = state.market.get_stats().await;
    Json(engine.snapshot())
}

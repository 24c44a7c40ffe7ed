//! 邮件通知接口

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications/password-reset", post(password_reset))
        .route("/api/notifications/welcome", post(welcome))
}

#[derive(Debug, Deserialize)]
struct PasswordResetRequest {
    email: String,
    #[serde(default)]
    name: Option<String>,
    token: String,
}

#[derive(Debug, Serialize)]
struct SentResponse {
    sent: bool,
    message_id: String,
}

/// 密码重置邮件：发送失败返回 502，由调用方提示用户重试
async fn password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> ApiResult<SentResponse> {
    let message_id = state
        .notify
        .get_notifications()
        .send_password_reset(&request.email, request.name.as_deref(), &request.token)
        .await?;

    Ok(Json(SentResponse {
        sent: true,
        message_id,
    }))
}

#[derive(Debug, Deserialize)]
struct WelcomeRequest {
    email: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct AcceptedResponse {
    accepted: bool,
}

/// 欢迎邮件：后台发送，总是返回 202
async fn welcome(
    State(state): State<AppState>,
    Json(request): Json<WelcomeRequest>,
) -> (StatusCode, Json<AcceptedResponse>) {
    let notifications = state.notify.get_notifications().clone();
    tokio::spawn(async move {
        notifications
            .send_welcome(&request.email, request.name.as_deref())
            .await;
    });
    info!("欢迎邮件已加入发送队列");

    (StatusCode::ACCEPTED, Json(AcceptedResponse { accepted: true }))
}

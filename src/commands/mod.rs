//! HTTP 接口模块
//!
//! 提供前端调用的所有接口，按功能分组：
//! - health: 健康检查
//! - stats: 首页实时统计
//! - geo: 地理编码与坐标校验
//! - matching: 匹配评分
//! - notifications: 邮件通知
//! - admin: 后台配置、状态与日志

pub mod admin;
pub mod geo;
pub mod health;
pub mod matching;
pub mod notifications;
pub mod stats;

use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::geo::{CoordinateError, GeoError};
use crate::mail::MailError;
use crate::matching::MatchError;
use crate::AppState;

/// 接口错误，统一渲染为 `{"error": ..., "retry_after": ...}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub retry_after: Option<u64>,
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "غير مصرح بالوصول")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "retry_after": self.retry_after,
        }));
        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<GeoError> for ApiError {
    fn from(err: GeoError) -> Self {
        match err {
            GeoError::RateLimited(limited) => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: limited.to_string(),
                retry_after: Some(limited.retry_after_secs),
            },
            GeoError::InvalidRequest(message) => Self::bad_request(message),
        }
    }
}

impl From<CoordinateError> for ApiError {
    fn from(err: CoordinateError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::ZeroWeights => Self::internal(err.to_string()),
            _ => Self::bad_request(err.to_string()),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        match err {
            MailError::InvalidInput(message) => Self::bad_request(message),
            MailError::Delivery(_) => Self::new(StatusCode::BAD_GATEWAY, err.to_string()),
        }
    }
}

/// 组装全部路由
pub fn router(state: AppState) -> Router {
    let admin_routes = admin::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        admin::require_admin_token,
    ));

    Router::new()
        .merge(health::router())
        .merge(stats::router())
        .merge(geo::router())
        .merge(matching::router())
        .merge(notifications::router())
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        // 前端单页应用部署在其他域名
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//! 后台管理接口
//!
//! 配置读取与部分更新、服务计数、最近日志。配置了令牌时需携带 `X-Admin-Token`，
//! 未配置令牌时只接受本机直连（无代理转发头）的请求。

use axum::extract::{Query, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ApiError, ApiResult};
use crate::logger::LogMessage;
use crate::mail;
use crate::models::{AppConfig, PersistedAppConfig, ServiceStatus};
use crate::settings::redacted;
use crate::stats::StatsEngine;
use crate::utils::{has_forwarded_headers, peer_ip};
use crate::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

const DEFAULT_LOG_LIMIT: usize = 100;
const MAX_LOG_LIMIT: usize = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/config", get(get_config).put(update_config))
        .route("/api/admin/status", get(get_status))
        .route("/api/admin/logs", get(get_logs))
        .route("/api/admin/geocode-cache", delete(clear_geocode_cache))
}

/// 逐字节比较，耗时与内容无关
fn tokens_match(expected: &str, provided: &str) -> bool {
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 后台令牌校验中间件
pub async fn require_admin_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state
        .system
        .get_settings()
        .get()
        .await
        .admin
        .token
        .filter(|t| !t.trim().is_empty());

    match expected {
        Some(expected) => {
            let provided = req
                .headers()
                .get(ADMIN_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if !tokens_match(&expected, provided) {
                warn!("后台接口令牌校验失败: {}", req.uri().path());
                return Err(ApiError::unauthorized());
            }
        }
        None => {
            let local = peer_ip(req.extensions()).is_some_and(|ip| ip.is_loopback())
                && !has_forwarded_headers(req.headers());
            if !local {
                warn!("未配置后台令牌，拒绝非本机请求: {}", req.uri().path());
                return Err(ApiError::forbidden(
                    "لوحة الإدارة متاحة محلياً فقط حتى يتم تعيين رمز الوصول",
                ));
            }
        }
    }

    Ok(next.run(req).await)
}

async fn get_config(State(state): State<AppState>) -> Json<PersistedAppConfig> {
    Json(redacted(state.system.get_settings().get().await))
}

/// 部分更新配置，并同步到运行中的组件
///
/// 可能失败的组件先按新配置构建好，全部成功后才写回文件。
async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<AppConfig>,
) -> ApiResult<PersistedAppConfig> {
    let settings = state.system.get_settings();
    let candidate = settings
        .preview(update.clone())
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let stats_engine = match &update.stats {
        Some(_) => Some(
            StatsEngine::new(candidate.stats.utc_offset_minutes)
                .map_err(|e| ApiError::bad_request(e.to_string()))?,
        ),
        None => None,
    };
    let mailer = match &update.email {
        Some(_) => Some(
            mail::build_mailer(&candidate.email)
                .map_err(|e| ApiError::bad_request(e.to_string()))?,
        ),
        None => None,
    };

    let effective = settings
        .update(update.clone())
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    if update.server.is_some() {
        info!("监听地址变更需重启服务后生效: {}", effective.server.bind);
    }
    if let Some(engine) = stats_engine {
        state.market.install_stats(engine).await;
    }
    if update.rate_limit.is_some() {
        state
            .geo
            .get_rate_limiter()
            .reconfigure(effective.rate_limit.clone())
            .await;
    }
    if update.geocoding.is_some() {
        state
            .geo
            .get_geocoder()
            .update_settings(effective.geocoding.clone())
            .await;
    }
    if let Some(mailer) = mailer {
        state
            .notify
            .get_notifications()
            .install(mailer, effective.email.app_base_url.clone())
            .await;
    }
    if update.matching.is_some() {
        state
            .market
            .apply_matching_settings(effective.matching.clone())
            .await;
    }
    if update.logger_settings.is_some() {
        // 日志级别与目录需重启生效，内存缓冲立即生效
        state.system.get_logs().configure(&effective.logger_settings);
    }

    info!("配置已更新");
    Ok(Json(redacted(effective)))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    uptime_secs: u64,
    counters: ServiceStatus,
    rate_limiter_healthy: bool,
    rate_limited_clients: usize,
    geocode_cache_entries: usize,
    mailer: String,
    log_buffer_entries: usize,
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let limiter = state.geo.get_rate_limiter();
    Json(StatusResponse {
        uptime_secs: state.system.uptime_secs(),
        counters: state.system.get_status().get().await,
        rate_limiter_healthy: limiter.health_check().await,
        rate_limited_clients: limiter.len().await,
        geocode_cache_entries: state.geo.get_geocoder().cache_len().await,
        mailer: state.notify.get_notifications().mailer_name().await,
        log_buffer_entries: state.system.get_logs().len(),
    })
}

#[derive(Debug, Serialize)]
struct ClearedResponse {
    cleared: usize,
}

/// 清空地理编码缓存，下次请求重新访问服务商
async fn clear_geocode_cache(State(state): State<AppState>) -> Json<ClearedResponse> {
    let geocoder = state.geo.get_geocoder();
    let cleared = geocoder.cache_len().await;
    geocoder.clear_cache().await;
    Json(ClearedResponse { cleared })
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
    /// 最低级别，如 warn
    level: Option<String>,
}

async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Vec<LogMessage>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);
    let level = match query.level.as_deref() {
        Some(raw) => Some(
            raw.parse::<tracing::Level>()
                .map_err(|_| ApiError::bad_request(format!("مستوى السجل غير صالح: {}", raw)))?,
        ),
        None => None,
    };
    Ok(Json(state.system.get_logs().recent(limit, level)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use serde_json::json;

    fn admin_get(uri: &str, token: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(ADMIN_TOKEN_HEADER, token);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn local_put(body: serde_json::Value) -> axum::http::Request<Body> {
        let mut request = json_request("PUT", "/api/admin/config", body);
        request.headers_mut().remove("x-forwarded-for");
        from_loopback(request)
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3cret", "s3cres"));
        assert!(!tokens_match("s3cret", "s3cret!"));
        assert!(!tokens_match("s3cret", ""));
    }

    #[tokio::test]
    async fn test_admin_requires_token_when_configured() {
        let app = test_app(Some("s3cret"), false).await;

        let (status, _, _) = send(&app.router, admin_get("/api/admin/status", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) = send(&app.router, admin_get("/api/admin/status", Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // 配置了令牌后本机请求同样需要令牌
        let (status, _, _) = send(
            &app.router,
            from_loopback(admin_get("/api/admin/status", None)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, body) = send(&app.router, admin_get("/api/admin/config", Some("s3cret"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["admin"]["token"], "********");
        assert_eq!(body["rate_limit"]["window_secs"], 60);
    }

    #[tokio::test]
    async fn test_without_token_remote_clients_are_refused() {
        let app = test_app(None, false).await;
        let hijack = json!({"email": {"api_url": "https://attacker.example/emails"}});

        let remote = from_peer(
            json_request("PUT", "/api/admin/config", hijack.clone()),
            [198, 51, 100, 9],
        );
        let (status, _, body) = send(&app.router, remote).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].is_string());

        // 未知来源
        let unknown = json_request("PUT", "/api/admin/config", hijack.clone());
        let (status, _, _) = send(&app.router, unknown).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // 经由本机代理转发的外部请求
        let proxied = from_loopback(json_request("PUT", "/api/admin/config", hijack));
        let (status, _, _) = send(&app.router, proxied).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let config = app.state.system.get_settings().get().await;
        assert_eq!(
            config.email.api_url,
            crate::models::EmailSettings::default().api_url
        );
    }

    #[tokio::test]
    async fn test_without_token_loopback_is_allowed() {
        let app = test_app(None, false).await;
        let (status, _, body) = send(
            &app.router,
            from_loopback(admin_get("/api/admin/status", None)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rate_limiter_healthy"], true);
        assert_eq!(body["mailer"], "stub");
    }

    #[tokio::test]
    async fn test_update_config_reconfigures_rate_limiter() {
        let app = test_app(None, false).await;

        let (status, _, body) = send(
            &app.router,
            local_put(json!({"rate_limit": {"window_secs": 60, "max_requests": 2, "purge_interval_secs": 300}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rate_limit"]["max_requests"], 2);

        let limiter = app.state.geo.get_rate_limiter();
        assert!(limiter.check("203.0.113.1").await.is_ok());
        assert!(limiter.check("203.0.113.1").await.is_ok());
        assert!(limiter.check("203.0.113.1").await.is_err());
    }

    #[tokio::test]
    async fn test_update_config_applies_matching_threshold() {
        let app = test_app(None, false).await;
        let (status, _, _) = send(&app.router, local_put(json!({"matching": {"threshold": 85}}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.state.market.get_matching().await.threshold, 85);
    }

    #[tokio::test]
    async fn test_update_config_resizes_geocode_cache() {
        let app = test_app(None, false).await;
        let mut geocoding = serde_json::to_value(crate::models::GeocodingSettings::default()).unwrap();
        geocoding["cache_size"] = json!(3);

        let (status, _, _) = send(&app.router, local_put(json!({"geocoding": geocoding}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.state.geo.get_geocoder().cache_capacity().await, 3);
    }

    #[tokio::test]
    async fn test_invalid_update_is_400() {
        let app = test_app(None, false).await;
        let (status, _, body) = send(&app.router, local_put(json!({"server": {"bind": "nowhere"}}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert_eq!(app.state.system.get_settings().get().await.server.bind, "0.0.0.0:8080");

        let (status, _, _) = send(
            &app.router,
            local_put(json!({"matching": {"weights": {"city": 4294967295u64, "price": 2}}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failed_mailer_build_is_not_persisted() {
        let app = test_app(None, false).await;
        let settings = app.state.system.get_settings();

        let (status, _, _) = send(
            &app.router,
            local_put(json!({"email": {"api_key": "re_\nlive", "from_address": "Aqar <team@aqar-match.sa>"}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let on_disk = std::fs::read_to_string(settings.path()).unwrap();
        assert!(!on_disk.contains("team@aqar-match.sa"));
        assert_eq!(settings.get().await.email.api_key, None);
        assert_eq!(app.state.notify.get_notifications().mailer_name().await, "stub");
    }

    #[tokio::test]
    async fn test_clear_geocode_cache() {
        let app = test_app(None, false).await;
        let (status, _, _) = send(
            &app.router,
            json_request("POST", "/api/geo/geocode", json!({"address": "حي النرجس", "city": "الرياض"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.state.geo.get_geocoder().cache_len().await, 1);

        let request = axum::http::Request::builder()
            .method("DELETE")
            .uri("/api/admin/geocode-cache")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app.router, from_loopback(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], 1);
        assert_eq!(app.state.geo.get_geocoder().cache_len().await, 0);
    }

    #[tokio::test]
    async fn test_logs_endpoint() {
        let app = test_app(None, false).await;
        let buffer = app.state.system.get_logs();
        for (level, text) in [("INFO", "started"), ("WARN", "slow provider"), ("ERROR", "mail down")] {
            buffer.push(LogMessage {
                timestamp: "2024-03-15 10:00:00.000".to_string(),
                level: level.to_string(),
                target: "aqar_match_lib".to_string(),
                message: text.to_string(),
            });
        }

        let (status, _, body) = send(
            &app.router,
            from_loopback(admin_get("/api/admin/logs?level=warn&limit=1", None)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let logs = body.as_array().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["message"], "mail down");

        let (status, _, _) = send(
            &app.router,
            from_loopback(admin_get("/api/admin/logs?level=loud", None)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

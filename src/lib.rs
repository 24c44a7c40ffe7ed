// 应用入口：组装各领域、启动 Actor 与 HTTP 服务

pub mod actors;
pub mod commands;
pub mod domains;
pub mod geo;
pub mod logger;
pub mod mail;
pub mod matching;
pub mod models;
pub mod settings;
pub mod stats;
pub mod throttle;
pub mod utils;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::{error, info, warn};

use actors::{RateLimiterActor, ServiceStatusActor};
use domains::{GeoDomain, MarketDomain, NotifyDomain, SystemDomain};
use geo::{GeocodeProvider, GeocodingService, NominatimClient};
use logger::LogBuffer;
use mail::{Mailer, NotificationService};
use models::PersistedAppConfig;
use settings::SettingsManager;
use stats::StatsEngine;

/// 应用状态 - 按领域分组
#[derive(Clone)]
pub struct AppState {
    /// 系统领域：配置、状态、日志
    pub system: SystemDomain,
    /// 地理领域：地理编码、限流
    pub geo: GeoDomain,
    /// 通知领域：邮件
    pub notify: NotifyDomain,
    /// 市场领域：实时统计、匹配评分
    pub market: MarketDomain,
}

impl AppState {
    /// 创建应用状态并启动后台 Actor（需在 tokio 运行时中调用）
    pub fn build(
        config: &PersistedAppConfig,
        settings: Arc<SettingsManager>,
        log_buffer: Arc<LogBuffer>,
        provider: Arc<dyn GeocodeProvider>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self> {
        let (status_actor, status_handle) = ServiceStatusActor::new();
        tokio::spawn(async move {
            status_actor.run().await;
        });

        let (limiter_actor, limiter_handle) = RateLimiterActor::new(&config.rate_limit);
        tokio::spawn(async move {
            limiter_actor.run().await;
        });

        let geocoder = Arc::new(GeocodingService::new(
            provider,
            limiter_handle.clone(),
            status_handle.clone(),
            config.geocoding.clone(),
        ));
        let notifications = Arc::new(NotificationService::new(
            mailer,
            status_handle.clone(),
            config.email.app_base_url.clone(),
        ));
        let stats = StatsEngine::new(config.stats.utc_offset_minutes)?;

        Ok(Self {
            system: SystemDomain::new(settings, status_handle, log_buffer),
            geo: GeoDomain::new(geocoder, limiter_handle),
            notify: NotifyDomain::new(notifications),
            market: MarketDomain::new(stats, config.matching.clone()),
        })
    }
}

/// 构建 HTTP 路由
pub fn build_router(state: AppState) -> Router {
    commands::router(state)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("收到退出信号，正在关闭服务"),
        Err(e) => error!("监听退出信号失败: {}", e),
    }
}

/// 启动服务
pub async fn run() -> Result<()> {
    let settings = Arc::new(SettingsManager::new(settings::config_path()).await?);
    let config = settings.get().await;
    settings::validate_config(&config).context("配置校验失败")?;

    let log_buffer = Arc::new(LogBuffer::from_settings(&config.logger_settings));
    // guard 必须存活到进程退出
    let _log_guard = logger::init(&config.logger_settings, log_buffer.clone())?;
    info!("配置文件: {}", settings.path().display());

    let provider: Arc<dyn GeocodeProvider> = Arc::new(NominatimClient::new(&config.geocoding)?);
    let mailer = mail::build_mailer(&config.email)?;
    info!("地理编码服务: {}，邮件通道: {}", provider.name(), mailer.name());

    if config.admin.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
        warn!("未配置后台令牌（AQAR_ADMIN_TOKEN），后台接口仅允许本机直连访问");
    }
    if config.server.trust_forwarded_headers {
        info!("限流按 X-Forwarded-For / X-Real-IP 识别客户端，需部署在可信反向代理之后");
    }

    let state = AppState::build(&config, settings, log_buffer, provider, mailer)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("无法监听 {}", config.server.bind))?;
    info!("aqar-match 已启动，监听 {}", config.server.bind);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("服务已停止");
    Ok(())
}

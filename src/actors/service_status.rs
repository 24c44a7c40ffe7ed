// Service Status Actor - 使用Actor模式管理服务运行计数
//
// 用消息传递替代Arc<RwLock<ServiceStatus>>，消除锁竞争

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::models::ServiceStatus;

/// 服务事件
#[derive(Debug, Clone)]
pub enum StatusEvent {
    GeocodeRequested,
    GeocodeCacheHit,
    GeocodeProviderHit,
    GeocodeFallback { reason: String },
    RateLimited,
    EmailSent,
    EmailFailed { error: String },
}

/// 服务状态命令
pub enum ServiceStatusCommand {
    /// 记录事件
    Record { event: StatusEvent },

    /// 获取状态
    Get {
        reply: oneshot::Sender<ServiceStatus>,
    },

    /// 健康检查（Ping）
    HealthCheck { reply: oneshot::Sender<()> },
}

/// 服务状态Actor
pub struct ServiceStatusActor {
    receiver: mpsc::Receiver<ServiceStatusCommand>,
    status: ServiceStatus, // 无需RwLock
}

impl ServiceStatusActor {
    /// 创建新的Actor
    pub fn new() -> (Self, ServiceStatusHandle) {
        let (sender, receiver) = mpsc::channel(512);
        let actor = Self {
            receiver,
            status: ServiceStatus::default(),
        };
        let handle = ServiceStatusHandle { sender };
        (actor, handle)
    }

    /// 运行Actor
    pub async fn run(mut self) {
        tracing::info!("Service Status Actor 已启动");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                ServiceStatusCommand::Record { event } => self.apply(event),

                ServiceStatusCommand::Get { reply } => {
                    let _ = reply.send(self.status.clone());
                }

                ServiceStatusCommand::HealthCheck { reply } => {
                    let _ = reply.send(());
                }
            }
        }

        tracing::info!("Service Status Actor 已停止");
    }

    fn apply(&mut self, event: StatusEvent) {
        match event {
            StatusEvent::GeocodeRequested => self.status.geocode_requests += 1,
            StatusEvent::GeocodeCacheHit => self.status.geocode_cache_hits += 1,
            StatusEvent::GeocodeProviderHit => self.status.geocode_provider_hits += 1,
            StatusEvent::GeocodeFallback { reason } => {
                self.status.geocode_fallbacks += 1;
                self.set_error(reason);
            }
            StatusEvent::RateLimited => self.status.rate_limited += 1,
            StatusEvent::EmailSent => self.status.emails_sent += 1,
            StatusEvent::EmailFailed { error } => {
                self.status.emails_failed += 1;
                self.set_error(error);
            }
        }
    }

    fn set_error(&mut self, error: String) {
        self.status.last_error = Some(error);
        self.status.last_error_at = Some(Utc::now());
    }
}

/// 服务状态Handle
#[derive(Clone)]
pub struct ServiceStatusHandle {
    sender: mpsc::Sender<ServiceStatusCommand>,
}

impl ServiceStatusHandle {
    /// 记录事件（不等待处理结果）
    pub async fn record(&self, event: StatusEvent) {
        let _ = self.sender.send(ServiceStatusCommand::Record { event }).await;
    }

    /// 获取服务状态
    pub async fn get(&self) -> ServiceStatus {
        let (reply, rx) = oneshot::channel();
        self.sender.send(ServiceStatusCommand::Get { reply }).await.ok();
        rx.await.unwrap_or_default()
    }

    /// 健康检查，1 秒内无响应视为不健康
    pub async fn health_check(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(ServiceStatusCommand::HealthCheck { reply })
            .await
            .is_err()
        {
            return false;
        }
        matches!(timeout(Duration::from_secs(1), rx).await, Ok(Ok(())))
    }
}

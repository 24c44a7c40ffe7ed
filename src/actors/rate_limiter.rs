// Rate Limiter Actor - 使用Actor模式管理限流窗口
//
// 限流表只由一个任务持有，调用方通过消息传递访问，并由定时器清理过期窗口

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::models::RateLimitSettings;
use crate::throttle::{FixedWindowLimiter, RateLimited};

/// 限流命令
pub enum RateLimiterCommand {
    /// 检查并记录一次请求
    Check {
        key: String,
        reply: oneshot::Sender<Result<(), RateLimited>>,
    },

    /// 更新窗口参数
    Reconfigure { settings: RateLimitSettings },

    /// 立即清理过期窗口
    Purge { reply: oneshot::Sender<usize> },

    /// 获取跟踪的标识数量
    Len { reply: oneshot::Sender<usize> },

    /// 健康检查（Ping）
    HealthCheck { reply: oneshot::Sender<()> },
}

/// 限流Actor
pub struct RateLimiterActor {
    receiver: mpsc::Receiver<RateLimiterCommand>,
    limiter: FixedWindowLimiter, // 无需Mutex
    purge_every: Duration,
}

impl RateLimiterActor {
    /// 创建新的Actor
    pub fn new(settings: &RateLimitSettings) -> (Self, RateLimiterHandle) {
        let (sender, receiver) = mpsc::channel(256);
        let actor = Self {
            receiver,
            limiter: FixedWindowLimiter::from_settings(settings),
            purge_every: Duration::from_secs(settings.purge_interval_secs.max(1)),
        };
        let handle = RateLimiterHandle { sender };
        (actor, handle)
    }

    /// 运行Actor
    pub async fn run(mut self) {
        tracing::info!("Rate Limiter Actor 已启动");

        let mut purge_timer = interval(self.purge_every);
        purge_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 第一次 tick 立即返回，跳过
        purge_timer.tick().await;

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle(cmd);
                }
                _ = purge_timer.tick() => {
                    let removed = self.limiter.purge_expired(Instant::now());
                    if removed > 0 {
                        tracing::debug!("已清理 {} 个过期限流窗口", removed);
                    }
                }
            }
        }

        tracing::info!("Rate Limiter Actor 已停止");
    }

    fn handle(&mut self, cmd: RateLimiterCommand) {
        match cmd {
            RateLimiterCommand::Check { key, reply } => {
                let result = self.limiter.check(&key, Instant::now());
                if let Err(e) = &result {
                    tracing::debug!("标识 {} 被限流，{} 秒后可重试", key, e.retry_after_secs);
                }
                let _ = reply.send(result);
            }

            RateLimiterCommand::Reconfigure { settings } => {
                self.limiter.reconfigure(&settings);
                tracing::info!(
                    "限流配置已更新: 窗口={}秒, 配额={}",
                    settings.window_secs,
                    settings.max_requests
                );
            }

            RateLimiterCommand::Purge { reply } => {
                let removed = self.limiter.purge_expired(Instant::now());
                let _ = reply.send(removed);
            }

            RateLimiterCommand::Len { reply } => {
                let _ = reply.send(self.limiter.len());
            }

            RateLimiterCommand::HealthCheck { reply } => {
                let _ = reply.send(());
            }
        }
    }
}

/// 限流Handle
#[derive(Clone)]
pub struct RateLimiterHandle {
    sender: mpsc::Sender<RateLimiterCommand>,
}

impl RateLimiterHandle {
    /// 检查并记录一次请求
    ///
    /// Actor 已停止时放行，限流只是尽力而为
    pub async fn check(&self, key: &str) -> Result<(), RateLimited> {
        let (reply, rx) = oneshot::channel();
        let cmd = RateLimiterCommand::Check {
            key: key.to_string(),
            reply,
        };
        if self.sender.send(cmd).await.is_err() {
            tracing::warn!("Rate Limiter Actor 不可用，放行请求");
            return Ok(());
        }
        rx.await.unwrap_or(Ok(()))
    }

    /// 更新窗口参数
    pub async fn reconfigure(&self, settings: RateLimitSettings) {
        let _ = self
            .sender
            .send(RateLimiterCommand::Reconfigure { settings })
            .await;
    }

    /// 立即清理过期窗口
    pub async fn purge(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        self.sender.send(RateLimiterCommand::Purge { reply }).await.ok();
        rx.await.unwrap_or_default()
    }

    /// 当前跟踪的标识数量
    pub async fn len(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        self.sender.send(RateLimiterCommand::Len { reply }).await.ok();
        rx.await.unwrap_or_default()
    }

    /// 健康检查，1 秒内无响应视为不健康
    pub async fn health_check(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(RateLimiterCommand::HealthCheck { reply })
            .await
            .is_err()
        {
            return false;
        }
        matches!(timeout(Duration::from_secs(1), rx).await, Ok(Ok(())))
    }
}

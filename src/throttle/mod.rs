//! 固定窗口限流
//!
//! 按标识（客户端 IP、用户 ID 等）分别计数，默认每分钟只允许一次外部地理编码请求。
//! 仅在单进程内生效，不做跨进程协调。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::models::RateLimitSettings;

/// 超出配额
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("تم تجاوز الحد المسموح من الطلبات، حاول مرة أخرى بعد {retry_after_secs} ثانية")]
pub struct RateLimited {
    /// 距离窗口结束的秒数（向上取整，至少 1 秒）
    pub retry_after_secs: u64,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// 固定窗口限流器
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: HashMap<String, Window>,
    window: Duration,
    max_requests: u32,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            windows: HashMap::new(),
            window: window.max(Duration::from_secs(1)),
            max_requests: max_requests.max(1),
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(Duration::from_secs(settings.window_secs), settings.max_requests)
    }

    /// 更新窗口参数，已有窗口按新参数继续计数
    pub fn reconfigure(&mut self, settings: &RateLimitSettings) {
        self.window = Duration::from_secs(settings.window_secs).max(Duration::from_secs(1));
        self.max_requests = settings.max_requests.max(1);
    }

    /// 检查并记录一次请求
    pub fn check(&mut self, key: &str, now: Instant) -> Result<(), RateLimited> {
        let window = self.window;
        let entry = self.windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(entry.started_at);
        if elapsed >= window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            return Ok(());
        }

        let remaining = window.saturating_sub(elapsed);
        let retry_after_secs = (remaining.as_secs_f64().ceil() as u64).max(1);
        Err(RateLimited { retry_after_secs })
    }

    /// 清除已过期的窗口，返回清除数量
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.window;
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started_at) < window);
        before - self.windows.len()
    }

    /// 当前跟踪的标识数量
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

// Actor模块 - 使用Actor模式管理并发状态
//
// 用Actor模式替代Arc<Mutex<T>>，通过消息传递实现并发控制

pub mod rate_limiter;
pub mod service_status;

pub use rate_limiter::{RateLimiterActor, RateLimiterCommand, RateLimiterHandle};
pub use service_status::{ServiceStatusActor, ServiceStatusCommand, ServiceStatusHandle, StatusEvent};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RateLimitSettings;
    use std::time::Duration;

    fn spawn_limiter(settings: RateLimitSettings) -> RateLimiterHandle {
        let (actor, handle) = RateLimiterActor::new(&settings);
        tokio::spawn(async move {
            actor.run().await;
        });
        handle
    }

    #[tokio::test]
    async fn test_rate_limiter_health_check() {
        let handle = spawn_limiter(RateLimitSettings::default());

        let is_healthy = handle.health_check().await;
        assert!(is_healthy, "RateLimiterActor应该是健康的");
    }

    #[tokio::test]
    async fn test_service_status_health_check() {
        let (actor, handle) = ServiceStatusActor::new();
        tokio::spawn(async move {
            actor.run().await;
        });

        let is_healthy = handle.health_check().await;
        assert!(is_healthy, "ServiceStatusActor应该是健康的");
    }

    #[tokio::test]
    async fn test_health_check_timeout() {
        // 创建Actor但不运行，模拟Actor无响应
        let (actor, handle) = ServiceStatusActor::new();
        drop(actor);

        let is_healthy = handle.health_check().await;
        assert!(!is_healthy, "停止的Actor应该健康检查失败");
    }

    #[tokio::test]
    async fn test_rate_limiter_actor_window() {
        let handle = spawn_limiter(RateLimitSettings::default());

        assert!(handle.check("10.0.0.9").await.is_ok());
        let err = handle.check("10.0.0.9").await.unwrap_err();
        assert!(err.retry_after_secs >= 59 && err.retry_after_secs <= 60);

        // 其他标识不受影响
        assert!(handle.check("10.0.0.10").await.is_ok());
        assert_eq!(handle.len().await, 2);
    }

    #[tokio::test]
    async fn test_rate_limiter_actor_expiry() {
        let handle = spawn_limiter(RateLimitSettings {
            window_secs: 1,
            max_requests: 1,
            purge_interval_secs: 300,
        });

        assert!(handle.check("k").await.is_ok());
        assert!(handle.check("k").await.is_err());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(handle.check("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limiter_actor_reconfigure_and_purge() {
        let handle = spawn_limiter(RateLimitSettings::default());

        handle.check("k").await.unwrap();
        handle
            .reconfigure(RateLimitSettings {
                window_secs: 60,
                max_requests: 2,
                purge_interval_secs: 300,
            })
            .await;
        assert!(handle.check("k").await.is_ok());
        assert!(handle.check("k").await.is_err());

        // 窗口未过期，不会被清理
        assert_eq!(handle.purge().await, 0);
        assert_eq!(handle.len().await, 1);
    }

    #[tokio::test]
    async fn test_stopped_rate_limiter_lets_requests_through() {
        let (actor, handle) = RateLimiterActor::new(&RateLimitSettings::default());
        drop(actor);

        assert!(handle.check("k").await.is_ok());
        assert!(handle.check("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_service_status_counts_events() {
        let (actor, handle) = ServiceStatusActor::new();
        tokio::spawn(async move {
            actor.run().await;
        });

        handle.record(StatusEvent::GeocodeRequested).await;
        handle.record(StatusEvent::GeocodeRequested).await;
        handle.record(StatusEvent::GeocodeCacheHit).await;
        handle
            .record(StatusEvent::EmailFailed {
                error: "timeout".to_string(),
            })
            .await;

        let status = handle.get().await;
        assert_eq!(status.geocode_requests, 2);
        assert_eq!(status.geocode_cache_hits, 1);
        assert_eq!(status.emails_failed, 1);
        assert_eq!(status.last_error.as_deref(), Some("timeout"));
        assert!(status.last_error_at.is_some());
    }
}

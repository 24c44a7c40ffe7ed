//! 地理编码模块
//!
//! 地址 → 坐标。外部请求前先查缓存，再按客户端限流；服务商失败、无结果或结果不在
//! 沙特境内时，降级到城市中心（附带随机偏移），保证返回的坐标始终通过边界校验。

pub mod bounds;
pub mod cache;
pub mod cities;
pub mod nominatim;

pub use bounds::{validate_coordinates, CoordinateError, Coordinates};
pub use cache::MAX_CACHE_TTL_SECS;
pub use nominatim::{GeocodeProvider, NominatimClient, ProviderPlace};

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::actors::{RateLimiterHandle, ServiceStatusHandle, StatusEvent};
use crate::models::GeocodingSettings;
use crate::throttle::RateLimited;
use cache::GeocodeCache;

const MAX_ADDRESS_LEN: usize = 300;

/// 地理编码请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeRequest {
    pub address: String,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// 坐标来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeSource {
    /// 服务商返回
    Provider,
    /// 降级：请求中城市的中心
    CityCenter,
    /// 降级：默认城市（利雅得）中心
    DefaultCenter,
}

/// 地理编码结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub coordinates: Coordinates,
    pub source: GeocodeSource,
    pub display_name: Option<String>,
    /// 是否来自缓存
    pub cached: bool,
}

/// 地理编码错误
#[derive(Debug, Error)]
pub enum GeoError {
    #[error(transparent)]
    RateLimited(#[from] RateLimited),
    #[error("{0}")]
    InvalidRequest(String),
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// 拼接服务商查询语句
fn build_query(req: &GeocodeRequest) -> String {
    [Some(req.address.trim()), non_empty(&req.district), non_empty(&req.city)]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn validate_request(req: &GeocodeRequest) -> Result<(), GeoError> {
    let address = req.address.trim();
    if address.is_empty() && non_empty(&req.city).is_none() {
        return Err(GeoError::InvalidRequest("العنوان أو المدينة مطلوب".to_string()));
    }
    if address.chars().count() > MAX_ADDRESS_LEN {
        return Err(GeoError::InvalidRequest(format!(
            "العنوان طويل جداً (الحد الأقصى {} حرفاً)",
            MAX_ADDRESS_LEN
        )));
    }
    Ok(())
}

/// 降级坐标：城市中心（未知城市用默认城市）加随机偏移，并收缩回边界框
pub fn fallback_location(city: Option<&str>, jitter_deg: f64) -> GeocodeResult {
    let (center, source, name) = match city.and_then(cities::find_city) {
        Some(city) => (city.center(), GeocodeSource::CityCenter, city.name_ar),
        None => {
            let city = cities::default_city();
            (city.center(), GeocodeSource::DefaultCenter, city.name_ar)
        }
    };

    let coordinates = if jitter_deg > 0.0 && jitter_deg.is_finite() {
        let mut rng = rand::thread_rng();
        Coordinates::new(
            center.lat + rng.gen_range(-jitter_deg..=jitter_deg),
            center.lng + rng.gen_range(-jitter_deg..=jitter_deg),
        )
        .clamped_to_saudi()
    } else {
        center
    };

    GeocodeResult {
        coordinates,
        source,
        display_name: Some(name.to_string()),
        cached: false,
    }
}

/// 地理编码服务
pub struct GeocodingService {
    provider: Arc<dyn GeocodeProvider>,
    limiter: RateLimiterHandle,
    status: ServiceStatusHandle,
    cache: RwLock<GeocodeCache>,
    settings: RwLock<GeocodingSettings>,
}

impl GeocodingService {
    pub fn new(
        provider: Arc<dyn GeocodeProvider>,
        limiter: RateLimiterHandle,
        status: ServiceStatusHandle,
        settings: GeocodingSettings,
    ) -> Self {
        Self {
            provider,
            limiter,
            status,
            cache: RwLock::new(GeocodeCache::new(settings.cache_size)),
            settings: RwLock::new(settings),
        }
    }

    /// 更新缓存容量、时长与降级参数（服务商地址变更需重启）
    pub async fn update_settings(&self, settings: GeocodingSettings) {
        self.cache.write().await.resize(settings.cache_size);
        *self.settings.write().await = settings;
    }

    pub async fn cache_capacity(&self) -> usize {
        self.cache.read().await.capacity()
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
        info!("地理编码缓存已清空");
    }

    /// 地理编码；命中缓存时不消耗限流配额
    pub async fn geocode(
        &self,
        client_key: &str,
        req: &GeocodeRequest,
    ) -> Result<GeocodeResult, GeoError> {
        validate_request(req)?;
        self.status.record(StatusEvent::GeocodeRequested).await;

        let canonical_city = non_empty(&req.city).map(cities::canonical_city_name);
        let key = GeocodeCache::key_for(&[
            Some(req.address.as_str()),
            req.district.as_deref(),
            canonical_city.as_deref(),
        ]);

        let cached = self.cache.write().await.get(&key, Instant::now());
        if let Some(mut hit) = cached {
            debug!("地理编码缓存命中: {}", key);
            self.status.record(StatusEvent::GeocodeCacheHit).await;
            hit.cached = true;
            return Ok(hit);
        }

        if let Err(limited) = self.limiter.check(client_key).await {
            warn!(
                "客户端 {} 地理编码被限流，{} 秒后重试",
                client_key, limited.retry_after_secs
            );
            self.status.record(StatusEvent::RateLimited).await;
            return Err(limited.into());
        }

        let settings = self.settings.read().await.clone();
        let query = build_query(req);

        let fallback_reason = match self.provider.search(&query).await {
            Ok(Some(place)) if place.coordinates.is_within_saudi() => {
                info!(
                    "{} 地理编码成功: ({}, {})",
                    self.provider.name(),
                    place.coordinates.lat,
                    place.coordinates.lng
                );
                self.status.record(StatusEvent::GeocodeProviderHit).await;
                let result = GeocodeResult {
                    coordinates: place.coordinates,
                    source: GeocodeSource::Provider,
                    display_name: place.display_name,
                    cached: false,
                };
                self.cache.write().await.put(
                    key,
                    result.clone(),
                    Duration::from_secs(settings.cache_ttl_secs),
                    Instant::now(),
                );
                return Ok(result);
            }
            Ok(Some(place)) => format!(
                "结果不在沙特境内: ({}, {})",
                place.coordinates.lat, place.coordinates.lng
            ),
            Ok(None) => "服务商无结果".to_string(),
            Err(e) => format!("服务商请求失败: {}", e),
        };

        warn!("地理编码降级 [{}]: {}", query, fallback_reason);
        self.status
            .record(StatusEvent::GeocodeFallback {
                reason: fallback_reason,
            })
            .await;

        let result = fallback_location(non_empty(&req.city), settings.fallback_jitter_deg);
        self.cache.write().await.put(
            key,
            result.clone(),
            Duration::from_secs(settings.fallback_ttl_secs),
            Instant::now(),
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::{RateLimiterActor, ServiceStatusActor};
    use crate::models::RateLimitSettings;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        Place(f64, f64),
        Empty,
        Fail,
    }

    struct StubProvider {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl GeocodeProvider for StubProvider {
        async fn search(&self, _query: &str) -> anyhow::Result<Option<ProviderPlace>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Place(lat, lng) => Ok(Some(ProviderPlace {
                    coordinates: Coordinates::new(lat, lng),
                    display_name: Some("stub".to_string()),
                })),
                Reply::Empty => Ok(None),
                Reply::Fail => Err(anyhow!("connection refused")),
            }
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn service(provider: Arc<StubProvider>, jitter: f64) -> (GeocodingService, ServiceStatusHandle) {
        let (limiter, limiter_handle) = RateLimiterActor::new(&RateLimitSettings::default());
        tokio::spawn(async move { limiter.run().await });
        let (status, status_handle) = ServiceStatusActor::new();
        tokio::spawn(async move { status.run().await });

        let settings = GeocodingSettings {
            fallback_jitter_deg: jitter,
            ..GeocodingSettings::default()
        };
        (
            GeocodingService::new(provider, limiter_handle, status_handle.clone(), settings),
            status_handle,
        )
    }

    fn request(address: &str, city: Option<&str>) -> GeocodeRequest {
        GeocodeRequest {
            address: address.to_string(),
            district: None,
            city: city.map(str::to_string),
        }
    }

    #[test]
    fn test_build_query_skips_empty_parts() {
        let req = GeocodeRequest {
            address: " King Fahd Road ".to_string(),
            district: Some("  ".to_string()),
            city: Some("Riyadh".to_string()),
        };
        assert_eq!(build_query(&req), "King Fahd Road, Riyadh");
    }

    #[test]
    fn test_fallback_always_inside_bounds() {
        for city in [Some("Jazan"), Some("Arar"), Some("Atlantis"), None] {
            for _ in 0..50 {
                let result = fallback_location(city, 0.5);
                let c = result.coordinates;
                assert!(validate_coordinates(c.lat, c.lng).is_ok(), "{:?}", c);
            }
        }
    }

    #[test]
    fn test_fallback_sources() {
        let known = fallback_location(Some("جدة"), 0.0);
        assert_eq!(known.source, GeocodeSource::CityCenter);
        assert_eq!(known.coordinates, cities::find_city("jeddah").unwrap().center());

        let unknown = fallback_location(Some("Atlantis"), 0.0);
        assert_eq!(unknown.source, GeocodeSource::DefaultCenter);
        assert_eq!(unknown.coordinates, cities::default_city().center());
    }

    #[tokio::test]
    async fn test_provider_result_is_cached_without_consuming_quota() {
        let provider = StubProvider::new(Reply::Place(24.70, 46.68));
        let (svc, status) = service(provider.clone(), 0.02);
        let req = request("Olaya Street", Some("Riyadh"));

        let first = svc.geocode("1.1.1.1", &req).await.unwrap();
        assert_eq!(first.source, GeocodeSource::Provider);
        assert!(!first.cached);

        // 同一客户端在窗口内再次请求：命中缓存，不触发限流
        let second = svc.geocode("1.1.1.1", &request("olaya  street", Some("الرياض"))).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.coordinates, first.coordinates);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let counters = status.get().await;
        assert_eq!(counters.geocode_requests, 2);
        assert_eq!(counters.geocode_cache_hits, 1);
        assert_eq!(counters.geocode_provider_hits, 1);
    }

    #[tokio::test]
    async fn test_update_settings_resizes_live_cache() {
        let provider = StubProvider::new(Reply::Place(24.70, 46.68));
        let (svc, _status) = service(provider, 0.02);
        svc.geocode("4.4.4.4", &request("Olaya Street", Some("Riyadh")))
            .await
            .unwrap();
        svc.geocode("5.5.5.5", &request("Tahlia Street", Some("Jeddah")))
            .await
            .unwrap();
        assert_eq!(svc.cache_len().await, 2);

        svc.update_settings(GeocodingSettings {
            cache_size: 1,
            ..GeocodingSettings::default()
        })
        .await;
        assert_eq!(svc.cache_capacity().await, 1);
        assert_eq!(svc.cache_len().await, 1);
    }

    #[tokio::test]
    async fn test_second_uncached_request_is_rate_limited() {
        let provider = StubProvider::new(Reply::Place(24.70, 46.68));
        let (svc, _status) = service(provider.clone(), 0.02);

        svc.geocode("2.2.2.2", &request("Tahlia Street", Some("Jeddah")))
            .await
            .unwrap();
        let err = svc
            .geocode("2.2.2.2", &request("Corniche Road", Some("Jeddah")))
            .await
            .unwrap_err();
        match err {
            GeoError::RateLimited(limited) => assert!(limited.retry_after_secs >= 1),
            other => panic!("期望限流错误，实际 {:?}", other),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        // 其他客户端不受影响
        assert!(svc
            .geocode("3.3.3.3", &request("Corniche Road", Some("Jeddah")))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_city_center() {
        let provider = StubProvider::new(Reply::Fail);
        let (svc, status) = service(provider, 0.0);

        let result = svc
            .geocode("k", &request("Unknown lane", Some("Dammam")))
            .await
            .unwrap();
        assert_eq!(result.source, GeocodeSource::CityCenter);
        assert_eq!(result.coordinates, cities::find_city("dammam").unwrap().center());

        let counters = status.get().await;
        assert_eq!(counters.geocode_fallbacks, 1);
        assert!(counters.last_error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_out_of_bounds_and_empty_results_fall_back() {
        // 开罗坐标
        let (svc, _) = service(StubProvider::new(Reply::Place(30.0444, 31.2357)), 0.02);
        let result = svc.geocode("a", &request("Tahrir Square", None)).await.unwrap();
        assert_eq!(result.source, GeocodeSource::DefaultCenter);
        assert!(result.coordinates.is_within_saudi());

        let (svc, _) = service(StubProvider::new(Reply::Empty), 0.02);
        let result = svc.geocode("b", &request("", Some("Tabuk"))).await.unwrap();
        assert_eq!(result.source, GeocodeSource::CityCenter);
        let center = cities::find_city("tabuk").unwrap().center();
        assert!((result.coordinates.lat - center.lat).abs() <= 0.02 + 1e-9);
        assert!((result.coordinates.lng - center.lng).abs() <= 0.02 + 1e-9);
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let (svc, _) = service(StubProvider::new(Reply::Empty), 0.0);
        assert!(matches!(
            svc.geocode("k", &request("   ", None)).await,
            Err(GeoError::InvalidRequest(_))
        ));
        let long = "ش".repeat(MAX_ADDRESS_LEN + 1);
        assert!(matches!(
            svc.geocode("k", &request(&long, Some("Riyadh"))).await,
            Err(GeoError::InvalidRequest(_))
        ));
    }
}

// 地理领域管理器
//
// 负责地理编码服务与限流

use std::sync::Arc;

use crate::actors::RateLimiterHandle;
use crate::geo::GeocodingService;

/// 地理领域管理器
#[derive(Clone)]
pub struct GeoDomain {
    geocoder: Arc<GeocodingService>,
    rate_limiter: RateLimiterHandle,
}

impl GeoDomain {
    pub fn new(geocoder: Arc<GeocodingService>, rate_limiter: RateLimiterHandle) -> Self {
        Self {
            geocoder,
            rate_limiter,
        }
    }

    /// 获取地理编码服务
    pub fn get_geocoder(&self) -> &Arc<GeocodingService> {
        &self.geocoder
    }

    /// 获取限流Handle
    pub fn get_rate_limiter(&self) -> &RateLimiterHandle {
        &self.rate_limiter
    }
}

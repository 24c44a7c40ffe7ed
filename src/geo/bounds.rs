//! 坐标与沙特边界校验

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 沙特阿拉伯边界框（含边界）
pub const SAUDI_LAT_MIN: f64 = 16.0;
pub const SAUDI_LAT_MAX: f64 = 32.0;
pub const SAUDI_LNG_MIN: f64 = 34.0;
pub const SAUDI_LNG_MAX: f64 = 55.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// 经纬度坐标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// 坐标校验错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("إحداثيات غير صالحة")]
    NotFinite,
    #[error("الموقع ({lat}, {lng}) خارج حدود المملكة العربية السعودية")]
    OutOfBounds { lat: f64, lng: f64 },
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// 是否位于沙特边界框内
    pub fn is_within_saudi(&self) -> bool {
        (SAUDI_LAT_MIN..=SAUDI_LAT_MAX).contains(&self.lat)
            && (SAUDI_LNG_MIN..=SAUDI_LNG_MAX).contains(&self.lng)
    }

    /// 收缩到边界框内
    pub fn clamped_to_saudi(self) -> Self {
        Self {
            lat: self.lat.clamp(SAUDI_LAT_MIN, SAUDI_LAT_MAX),
            lng: self.lng.clamp(SAUDI_LNG_MIN, SAUDI_LNG_MAX),
        }
    }

    /// 球面距离（公里，haversine）
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// 校验坐标是否有效且位于沙特境内
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<Coordinates, CoordinateError> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(CoordinateError::NotFinite);
    }
    let coords = Coordinates::new(lat, lng);
    if !coords.is_within_saudi() {
        return Err(CoordinateError::OutOfBounds { lat, lng });
    }
    Ok(coords)
}

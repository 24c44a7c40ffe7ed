//! 买家偏好与房源的匹配评分
//!
//! 六项指标各自计算 [0,1] 的得分，乘以权重后汇总为 0-100 的总分。

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::geo::cities::{canonical_city_name, normalize_name};
use crate::geo::Coordinates;

/// 价格高于上限 20% 时得分降为 0
const PRICE_OVER_TOLERANCE: f64 = 0.20;
/// 价格低于下限 50% 时得分降为 0
const PRICE_UNDER_TOLERANCE: f64 = 0.50;
/// 面积偏离区间 25% 时得分降为 0
const AREA_TOLERANCE: f64 = 0.25;
/// 未知面积/卧室数的中性分
const UNKNOWN_SCORE: f64 = 0.5;
/// 单项权重上限
pub const MAX_WEIGHT: u32 = 1000;

/// 房产类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Apartment,
    Villa,
    Floor,
    Duplex,
    Townhouse,
    Land,
    Building,
    Office,
    Shop,
    Other,
}

/// 买家偏好（线索）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuyerPreference {
    pub city: String,
    /// 意向街区，空表示不限
    pub districts: Vec<String>,
    /// 意向类型，空表示不限
    pub property_types: Vec<PropertyType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// 面积（平方米）
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub min_bedrooms: Option<u32>,
    /// 位置中心与半径，两者都提供时按距离评分
    pub center: Option<Coordinates>,
    pub radius_km: Option<f64>,
}

/// 卖方房源
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyListing {
    pub id: String,
    pub city: String,
    #[serde(default)]
    pub district: Option<String>,
    pub property_type: PropertyType,
    pub price: f64,
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub location: Option<Coordinates>,
}

/// 各项权重
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchWeights {
    pub city: u32,
    pub location: u32,
    pub property_type: u32,
    pub price: u32,
    pub area: u32,
    pub bedrooms: u32,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            city: 25,
            location: 15,
            property_type: 20,
            price: 25,
            area: 10,
            bedrooms: 5,
        }
    }
}

impl MatchWeights {
    fn values(&self) -> [u32; 6] {
        [
            self.city,
            self.location,
            self.property_type,
            self.price,
            self.area,
            self.bedrooms,
        ]
    }

    /// 权重之和（按 u64 累加，不会溢出）
    pub fn total(&self) -> u64 {
        self.values().iter().map(|&w| u64::from(w)).sum()
    }

    pub fn largest(&self) -> u32 {
        self.values().into_iter().max().unwrap_or(0)
    }
}

/// 评分指标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    City,
    Location,
    PropertyType,
    Price,
    Area,
    Bedrooms,
}

/// 单项得分
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub criterion: Criterion,
    pub weight: u32,
    /// 0.0 - 1.0
    pub score: f64,
    /// weight × score
    pub points: f64,
}

/// 匹配明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchBreakdown {
    pub listing_id: String,
    /// 0 - 100
    pub total: u8,
    pub is_match: bool,
    pub components: Vec<ScoreComponent>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("مجموع أوزان المطابقة يساوي صفراً")]
    ZeroWeights,
    #[error("تفضيلات المشتري غير صالحة: {0}")]
    InvalidPreference(String),
    #[error("العقار {id} غير صالح: {reason}")]
    InvalidListing { id: String, reason: String },
}

fn check_range(name: &str, min: Option<f64>, max: Option<f64>) -> Result<(), MatchError> {
    for value in [min, max].into_iter().flatten() {
        if !value.is_finite() || value < 0.0 {
            return Err(MatchError::InvalidPreference(format!("{} يجب أن يكون رقماً موجباً", name)));
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(MatchError::InvalidPreference(format!(
                "الحد الأدنى لـ {} أكبر من الحد الأعلى",
                name
            )));
        }
    }
    Ok(())
}

/// 校验买家偏好
pub fn validate_preference(pref: &BuyerPreference) -> Result<(), MatchError> {
    check_range("السعر", pref.min_price, pref.max_price)?;
    check_range("المساحة", pref.min_area, pref.max_area)?;
    if let Some(radius) = pref.radius_km {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(MatchError::InvalidPreference("نصف القطر يجب أن يكون أكبر من صفر".to_string()));
        }
    }
    Ok(())
}

fn validate_listing(listing: &PropertyListing) -> Result<(), MatchError> {
    let invalid = |reason: &str| MatchError::InvalidListing {
        id: listing.id.clone(),
        reason: reason.to_string(),
    };
    if !listing.price.is_finite() || listing.price < 0.0 {
        return Err(invalid("السعر غير صالح"));
    }
    if let Some(area) = listing.area {
        if !area.is_finite() || area < 0.0 {
            return Err(invalid("المساحة غير صالحة"));
        }
    }
    Ok(())
}

fn city_score(pref: &BuyerPreference, listing: &PropertyListing) -> f64 {
    if pref.city.trim().is_empty() {
        return 1.0;
    }
    if canonical_city_name(&pref.city) == canonical_city_name(&listing.city) {
        1.0
    } else {
        0.0
    }
}

fn location_score(pref: &BuyerPreference, listing: &PropertyListing) -> f64 {
    if let (Some(center), Some(radius), Some(location)) = (pref.center, pref.radius_km, listing.location) {
        let distance = center.distance_km(&location);
        if distance <= radius {
            return 1.0;
        }
        return (1.0 - (distance - radius) / radius).max(0.0);
    }

    if pref.districts.is_empty() {
        return 1.0;
    }
    match &listing.district {
        Some(district) => {
            let district = normalize_name(district);
            if pref.districts.iter().any(|d| normalize_name(d) == district) {
                1.0
            } else {
                0.0
            }
        }
        None => 0.0,
    }
}

fn property_type_score(pref: &BuyerPreference, listing: &PropertyListing) -> f64 {
    if pref.property_types.is_empty() || pref.property_types.contains(&listing.property_type) {
        1.0
    } else {
        0.0
    }
}

/// 区间内得 1，区间外按相对偏离线性衰减
fn range_score(value: f64, min: Option<f64>, max: Option<f64>, over_tol: f64, under_tol: f64) -> f64 {
    if let Some(max) = max {
        if value > max {
            if max <= 0.0 {
                return 0.0;
            }
            let over = (value - max) / max;
            return (1.0 - over / over_tol).max(0.0);
        }
    }
    if let Some(min) = min {
        if value < min {
            if min <= 0.0 {
                return 1.0;
            }
            let under = (min - value) / min;
            return (1.0 - under / under_tol).max(0.0);
        }
    }
    1.0
}

fn price_score(pref: &BuyerPreference, listing: &PropertyListing) -> f64 {
    range_score(
        listing.price,
        pref.min_price,
        pref.max_price,
        PRICE_OVER_TOLERANCE,
        PRICE_UNDER_TOLERANCE,
    )
}

fn area_score(pref: &BuyerPreference, listing: &PropertyListing) -> f64 {
    if pref.min_area.is_none() && pref.max_area.is_none() {
        return 1.0;
    }
    match listing.area {
        Some(area) => range_score(area, pref.min_area, pref.max_area, AREA_TOLERANCE, AREA_TOLERANCE),
        None => UNKNOWN_SCORE,
    }
}

fn bedrooms_score(pref: &BuyerPreference, listing: &PropertyListing) -> f64 {
    let Some(min) = pref.min_bedrooms else {
        return 1.0;
    };
    match listing.bedrooms {
        Some(bedrooms) if bedrooms >= min => 1.0,
        Some(bedrooms) => (1.0 - 0.5 * f64::from(min - bedrooms)).max(0.0),
        None => UNKNOWN_SCORE,
    }
}

/// 计算单个房源的匹配明细
pub fn score_match(
    pref: &BuyerPreference,
    listing: &PropertyListing,
    weights: &MatchWeights,
    threshold: u8,
) -> Result<MatchBreakdown, MatchError> {
    let total_weight = weights.total();
    if total_weight == 0 {
        return Err(MatchError::ZeroWeights);
    }
    validate_preference(pref)?;
    validate_listing(listing)?;

    let components: Vec<ScoreComponent> = [
        (Criterion::City, weights.city, city_score(pref, listing)),
        (Criterion::Location, weights.location, location_score(pref, listing)),
        (Criterion::PropertyType, weights.property_type, property_type_score(pref, listing)),
        (Criterion::Price, weights.price, price_score(pref, listing)),
        (Criterion::Area, weights.area, area_score(pref, listing)),
        (Criterion::Bedrooms, weights.bedrooms, bedrooms_score(pref, listing)),
    ]
    .into_iter()
    .map(|(criterion, weight, score)| ScoreComponent {
        criterion,
        weight,
        score,
        points: f64::from(weight) * score,
    })
    .collect();

    let points: f64 = components.iter().map(|c| c.points).sum();
    let total = (100.0 * points / total_weight as f64).round().clamp(0.0, 100.0) as u8;

    debug!("房源 {} 匹配得分 {}", listing.id, total);

    Ok(MatchBreakdown {
        listing_id: listing.id.clone(),
        total,
        is_match: total >= threshold,
        components,
    })
}

/// 按得分排序并过滤低于阈值的房源（同分按 ID 升序）
///
/// 数据不合法的房源会被跳过并记录警告，偏好或权重不合法则整体失败。
pub fn rank_matches(
    pref: &BuyerPreference,
    listings: &[PropertyListing],
    weights: &MatchWeights,
    threshold: u8,
) -> Result<Vec<MatchBreakdown>, MatchError> {
    if weights.total() == 0 {
        return Err(MatchError::ZeroWeights);
    }
    validate_preference(pref)?;

    let mut matches = Vec::new();
    for listing in listings {
        match score_match(pref, listing, weights, threshold) {
            Ok(breakdown) if breakdown.is_match => matches.push(breakdown),
            Ok(_) => {}
            Err(e @ MatchError::InvalidListing { .. }) => warn!("跳过房源: {}", e),
            Err(e) => return Err(e),
        }
    }

    matches.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.listing_id.cmp(&b.listing_id)));
    Ok(matches)
}

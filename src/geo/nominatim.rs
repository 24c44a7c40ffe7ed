// Nominatim 客户端模块
// 负责调用 OpenStreetMap 兼容的地理编码接口

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::bounds::Coordinates;
use crate::models::GeocodingSettings;

/// 服务商返回的地点
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPlace {
    pub coordinates: Coordinates,
    pub display_name: Option<String>,
}

/// 地理编码服务商
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// 查询地址，没有结果时返回 Ok(None)
    async fn search(&self, query: &str) -> Result<Option<ProviderPlace>>;

    /// 服务商名称（用于日志）
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// 解析 Nominatim 的 JSON 响应，取第一条结果
pub fn parse_search_response(body: &str) -> Result<Option<ProviderPlace>> {
    let places: Vec<NominatimPlace> = serde_json::from_str(body)?;
    let Some(first) = places.into_iter().next() else {
        return Ok(None);
    };

    let lat: f64 = first
        .lat
        .trim()
        .parse()
        .map_err(|e| anyhow!("无法解析纬度 {:?}: {}", first.lat, e))?;
    let lng: f64 = first
        .lon
        .trim()
        .parse()
        .map_err(|e| anyhow!("无法解析经度 {:?}: {}", first.lon, e))?;

    Ok(Some(ProviderPlace {
        coordinates: Coordinates::new(lat, lng),
        display_name: first.display_name,
    }))
}

/// Nominatim API 客户端
#[derive(Clone)]
pub struct NominatimClient {
    client: Client,
    base_url: String,
}

impl NominatimClient {
    /// 创建新的客户端
    pub fn new(settings: &GeocodingSettings) -> Result<Self> {
        if settings.user_agent.trim().is_empty() {
            return Err(anyhow!("Nominatim 要求设置 User-Agent"));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs.max(1)))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GeocodeProvider for NominatimClient {
    async fn search(&self, query: &str) -> Result<Option<ProviderPlace>> {
        let url = format!("{}/search", self.base_url);
        debug!("请求 Nominatim: {}", query);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("format", "jsonv2"),
                ("limit", "1"),
                ("countrycodes", "sa"),
                ("accept-language", "ar"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Nominatim 返回错误 {}: {}", status, error_text);
            return Err(anyhow!("Nominatim 请求失败: {} {}", status, error_text));
        }

        let body = response.text().await?;
        parse_search_response(&body)
    }

    fn name(&self) -> &str {
        "nominatim"
    }
}

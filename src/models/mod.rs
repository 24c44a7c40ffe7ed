// 数据模型模块 - 定义配置与服务状态的数据结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 重新导出其他模块的类型
pub use crate::geo::{Coordinates, GeocodeRequest, GeocodeResult, GeocodeSource};
pub use crate::matching::{BuyerPreference, MatchBreakdown, MatchWeights, PropertyListing};
pub use crate::stats::LiveStats;

/// 应用配置（部分更新，None 表示保持不变）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务监听配置
    pub server: Option<ServerSettings>,
    /// 统计生成配置
    pub stats: Option<StatsSettings>,
    /// 限流配置
    pub rate_limit: Option<RateLimitSettings>,
    /// 地理编码配置
    pub geocoding: Option<GeocodingSettings>,
    /// 邮件配置
    pub email: Option<EmailSettings>,
    /// 匹配评分配置
    pub matching: Option<MatchingSettings>,
    /// 日志配置
    pub logger_settings: Option<LoggerSettings>,
    /// 后台管理配置
    pub admin: Option<AdminSettings>,
}

/// 持久化的应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedAppConfig {
    pub server: ServerSettings,
    pub stats: StatsSettings,
    pub rate_limit: RateLimitSettings,
    pub geocoding: GeocodingSettings,
    pub email: EmailSettings,
    pub matching: MatchingSettings,
    pub logger_settings: LoggerSettings,
    pub admin: AdminSettings,
}

/// 服务监听配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// 监听地址
    pub bind: String,
    /// 是否信任 X-Forwarded-For / X-Real-IP（仅在可信反向代理之后开启）
    pub trust_forwarded_headers: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            trust_forwarded_headers: false,
        }
    }
}

/// 统计生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSettings {
    /// 相对 UTC 的分钟偏移，默认利雅得时间 (+03:00)
    pub utc_offset_minutes: i32,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 180,
        }
    }
}

/// 限流配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// 窗口长度（秒）
    pub window_secs: u64,
    /// 每个窗口允许的请求数
    pub max_requests: u32,
    /// 过期窗口清理间隔（秒）
    pub purge_interval_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 1,
            purge_interval_secs: 300,
        }
    }
}

/// 地理编码配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingSettings {
    /// Nominatim 兼容服务地址
    pub base_url: String,
    /// 请求时携带的 User-Agent（Nominatim 使用政策要求）
    pub user_agent: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
    /// 缓存条目上限
    pub cache_size: usize,
    /// 成功结果缓存时长（秒）
    pub cache_ttl_secs: u64,
    /// 降级结果缓存时长（秒）
    pub fallback_ttl_secs: u64,
    /// 降级坐标的随机偏移幅度（度），0 表示不偏移
    pub fallback_jitter_deg: f64,
}

impl Default for GeocodingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "aqar-match/0.1 (support@aqar-match.sa)".to_string(),
            timeout_secs: 10,
            cache_size: 500,
            cache_ttl_secs: 24 * 3600,
            fallback_ttl_secs: 600,
            fallback_jitter_deg: 0.02,
        }
    }
}

/// 邮件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    /// 邮件服务商接口地址
    pub api_url: String,
    /// API 密钥，为空时只写日志不发送
    pub api_key: Option<String>,
    /// 发件人
    pub from_address: String,
    /// 前端站点地址，用于拼接重置链接
    pub app_base_url: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: None,
            from_address: "Aqar Match <no-reply@aqar-match.sa>".to_string(),
            app_base_url: "https://aqar-match.sa".to_string(),
            timeout_secs: 15,
        }
    }
}

/// 匹配评分配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingSettings {
    pub weights: MatchWeights,
    /// 计为匹配的最低分（0-100）
    pub threshold: u8,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            weights: MatchWeights::default(),
            threshold: 60,
        }
    }
}

/// 日志设置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    /// 日志级别（trace/debug/info/warn/error）
    pub level: String,
    /// 日志目录
    pub log_dir: String,
    /// 是否把日志保留在内存中供后台查看
    pub enable_admin_buffer: bool,
    /// 内存日志条数上限
    pub buffer_capacity: usize,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: "logs".to_string(),
            enable_admin_buffer: true,
            buffer_capacity: 500,
        }
    }
}

/// 后台管理设置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    /// 后台接口访问令牌，为空时只允许本机直连访问
    pub token: Option<String>,
}

/// 服务运行状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// 启动时间
    pub started_at: DateTime<Utc>,
    /// 地理编码请求总数
    pub geocode_requests: u64,
    /// 命中缓存次数
    pub geocode_cache_hits: u64,
    /// 服务商成功返回次数
    pub geocode_provider_hits: u64,
    /// 降级次数
    pub geocode_fallbacks: u64,
    /// 被限流次数
    pub rate_limited: u64,
    /// 邮件发送成功次数
    pub emails_sent: u64,
    /// 邮件发送失败次数
    pub emails_failed: u64,
    /// 最近一次错误
    pub last_error: Option<String>,
    /// 最近一次错误时间
    pub last_error_at: Option<DateTime<Utc>>,
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            geocode_requests: 0,
            geocode_cache_hits: 0,
            geocode_provider_hits: 0,
            geocode_fallbacks: 0,
            rate_limited: 0,
            emails_sent: 0,
            emails_failed: 0,
            last_error: None,
            last_error_at: None,
        }
    }
}

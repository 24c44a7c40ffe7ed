use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::geo::MAX_CACHE_TTL_SECS;
use crate::matching::MAX_WEIGHT;
use crate::models::{AppConfig, PersistedAppConfig};

/// 配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "AQAR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/aqar-match.json";

const REDACTED: &str = "********";

/// 配置文件路径：优先环境变量
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// 环境变量覆盖项（只作用于内存，不写回文件）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub bind: Option<String>,
    pub log_level: Option<String>,
    pub email_api_key: Option<String>,
    pub admin_token: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            bind: get("AQAR_BIND"),
            log_level: get("AQAR_LOG_LEVEL"),
            email_api_key: get("AQAR_EMAIL_API_KEY"),
            admin_token: get("AQAR_ADMIN_TOKEN"),
        }
    }

    fn apply(&self, config: &mut PersistedAppConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(level) = &self.log_level {
            config.logger_settings.level = level.clone();
        }
        if let Some(key) = &self.email_api_key {
            config.email.api_key = Some(key.clone());
        }
        if let Some(token) = &self.admin_token {
            config.admin.token = Some(token.clone());
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// 校验完整配置
pub fn validate_config(config: &PersistedAppConfig) -> Result<()> {
    config
        .server
        .bind
        .parse::<SocketAddr>()
        .map_err(|e| anyhow!("监听地址无效 {:?}: {}", config.server.bind, e))?;

    if config.stats.utc_offset_minutes.abs() > 14 * 60 {
        bail!("UTC 偏移超出范围: {} 分钟", config.stats.utc_offset_minutes);
    }

    let rl = &config.rate_limit;
    if rl.window_secs == 0 || rl.max_requests == 0 || rl.purge_interval_secs == 0 {
        bail!("限流参数必须大于 0");
    }

    let geo = &config.geocoding;
    if !is_http_url(&geo.base_url) {
        bail!("地理编码服务地址无效: {}", geo.base_url);
    }
    if geo.user_agent.trim().is_empty() {
        bail!("地理编码 User-Agent 不能为空");
    }
    if geo.cache_size == 0 {
        bail!("地理编码缓存大小必须大于 0");
    }
    if geo.cache_ttl_secs > MAX_CACHE_TTL_SECS || geo.fallback_ttl_secs > MAX_CACHE_TTL_SECS {
        bail!("地理编码缓存时长不能超过 {} 秒", MAX_CACHE_TTL_SECS);
    }
    if !geo.fallback_jitter_deg.is_finite() || !(0.0..=0.5).contains(&geo.fallback_jitter_deg) {
        bail!("降级偏移必须在 0 到 0.5 度之间");
    }

    if !is_http_url(&config.email.api_url) || !is_http_url(&config.email.app_base_url) {
        bail!("邮件配置中的地址无效");
    }

    if config.matching.weights.total() == 0 {
        bail!("匹配权重之和不能为 0");
    }
    if config.matching.weights.largest() > MAX_WEIGHT {
        bail!("单项匹配权重不能超过 {}", MAX_WEIGHT);
    }
    if config.matching.threshold > 100 {
        bail!("匹配阈值必须在 0 到 100 之间");
    }

    config
        .logger_settings
        .level
        .parse::<tracing::Level>()
        .map_err(|_| anyhow!("日志级别无效: {}", config.logger_settings.level))?;
    if config.logger_settings.buffer_capacity == 0 {
        bail!("日志缓冲区容量必须大于 0");
    }

    Ok(())
}

/// 隐藏密钥后的配置（用于后台展示）
pub fn redacted(mut config: PersistedAppConfig) -> PersistedAppConfig {
    if config.email.api_key.is_some() {
        config.email.api_key = Some(REDACTED.to_string());
    }
    if config.admin.token.is_some() {
        config.admin.token = Some(REDACTED.to_string());
    }
    config
}

pub struct SettingsManager {
    path: PathBuf,
    data: RwLock<PersistedAppConfig>,
    overrides: EnvOverrides,
}

impl SettingsManager {
    pub async fn new(path: PathBuf) -> Result<Self> {
        Self::with_overrides(path, EnvOverrides::from_env()).await
    }

    pub async fn with_overrides(path: PathBuf, overrides: EnvOverrides) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let initial = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => {
                match serde_json::from_slice::<PersistedAppConfig>(&bytes) {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("配置文件解析失败，使用默认配置: {}", e);
                        PersistedAppConfig::default()
                    }
                }
            }
            _ => {
                let default = PersistedAppConfig::default();
                let json = serde_json::to_string_pretty(&default)?;
                tokio::fs::write(&path, json).await?;
                info!("已创建默认配置文件: {}", path.display());
                default
            }
        };

        Ok(Self {
            path,
            data: RwLock::new(initial),
            overrides,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 当前生效配置（文件配置 + 环境变量覆盖）
    pub async fn get(&self) -> PersistedAppConfig {
        let mut config = self.data.read().await.clone();
        self.overrides.apply(&mut config);
        config
    }

    /// 合并部分更新并校验，不写回文件，返回生效配置
    pub async fn preview(&self, update: AppConfig) -> Result<PersistedAppConfig> {
        let data = self.data.read().await;
        let (_, effective) = self.merge(&data, update)?;
        Ok(effective)
    }

    /// 部分更新，校验通过后写回文件，返回生效配置
    pub async fn update(&self, update: AppConfig) -> Result<PersistedAppConfig> {
        let mut data = self.data.write().await;
        let (config, effective) = self.merge(&data, update)?;

        self.save(&config).await?;
        *data = config;
        Ok(effective)
    }

    /// 返回（待持久化配置，叠加环境变量后的生效配置）
    fn merge(
        &self,
        current: &PersistedAppConfig,
        update: AppConfig,
    ) -> Result<(PersistedAppConfig, PersistedAppConfig)> {
        let mut config = current.clone();

        if let Some(server) = update.server {
            config.server = server;
        }
        if let Some(stats) = update.stats {
            config.stats = stats;
        }
        if let Some(rate_limit) = update.rate_limit {
            config.rate_limit = rate_limit;
        }
        if let Some(geocoding) = update.geocoding {
            config.geocoding = geocoding;
        }
        if let Some(mut email) = update.email {
            // 后台回传的脱敏密钥保持原值
            if email.api_key.as_deref() == Some(REDACTED) {
                email.api_key = config.email.api_key.clone();
            }
            config.email = email;
        }
        if let Some(matching) = update.matching {
            config.matching = matching;
        }
        if let Some(logger) = update.logger_settings {
            config.logger_settings = logger;
        }
        if let Some(mut admin) = update.admin {
            if admin.token.as_deref() == Some(REDACTED) {
                admin.token = config.admin.token.clone();
            }
            config.admin = admin;
        }

        let mut effective = config.clone();
        self.overrides.apply(&mut effective);
        validate_config(&effective)?;
        Ok((config, effective))
    }

    async fn save(&self, config: &PersistedAppConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailSettings, RateLimitSettings, StatsSettings};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&PersistedAppConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PersistedAppConfig::default();
        config.server.bind = "not-an-address".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = PersistedAppConfig::default();
        config.matching.weights = crate::models::MatchWeights {
            city: 0,
            location: 0,
            property_type: 0,
            price: 0,
            area: 0,
            bedrooms: 0,
        };
        assert!(validate_config(&config).is_err());

        let mut config = PersistedAppConfig::default();
        config.logger_settings.level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = PersistedAppConfig::default();
        config.stats.utc_offset_minutes = 15 * 60;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_overflowing_weights() {
        let mut config = PersistedAppConfig::default();
        config.matching.weights.city = u32::MAX;
        config.matching.weights.price = 2;
        assert!(validate_config(&config).is_err());

        let mut config = PersistedAppConfig::default();
        config.matching.weights.area = MAX_WEIGHT;
        assert!(validate_config(&config).is_ok());
        config.matching.weights.area = MAX_WEIGHT + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_huge_cache_ttl() {
        let mut config = PersistedAppConfig::default();
        config.geocoding.cache_ttl_secs = u64::MAX;
        assert!(validate_config(&config).is_err());

        let mut config = PersistedAppConfig::default();
        config.geocoding.fallback_ttl_secs = MAX_CACHE_TTL_SECS + 1;
        assert!(validate_config(&config).is_err());

        config.geocoding.fallback_ttl_secs = MAX_CACHE_TTL_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_env_overrides_from_lookup() {
        let overrides = EnvOverrides::from_lookup(|key| match key {
            "AQAR_BIND" => Some("127.0.0.1:9000".to_string()),
            "AQAR_ADMIN_TOKEN" => Some("secret".to_string()),
            "AQAR_LOG_LEVEL" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(overrides.bind.as_deref(), Some("127.0.0.1:9000"));
        assert_eq!(overrides.admin_token.as_deref(), Some("secret"));
        assert_eq!(overrides.log_level, None);
        assert_eq!(overrides.email_api_key, None);
    }

    #[tokio::test]
    async fn test_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let manager = SettingsManager::with_overrides(path.clone(), EnvOverrides::default())
            .await
            .unwrap();
        assert!(path.exists());
        assert_eq!(manager.get().await.rate_limit, RateLimitSettings::default());
    }

    #[tokio::test]
    async fn test_update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let manager = SettingsManager::with_overrides(path.clone(), EnvOverrides::default())
            .await
            .unwrap();
        let updated = manager
            .update(AppConfig {
                rate_limit: Some(RateLimitSettings {
                    window_secs: 30,
                    max_requests: 2,
                    purge_interval_secs: 120,
                }),
                stats: Some(StatsSettings {
                    utc_offset_minutes: 240,
                }),
                ..AppConfig::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.rate_limit.window_secs, 30);

        let reloaded = SettingsManager::with_overrides(path, EnvOverrides::default())
            .await
            .unwrap()
            .get()
            .await;
        assert_eq!(reloaded.rate_limit.max_requests, 2);
        assert_eq!(reloaded.stats.utc_offset_minutes, 240);
        // 未更新的部分保持默认
        assert_eq!(reloaded.matching.threshold, 60);
    }

    #[tokio::test]
    async fn test_invalid_update_is_rejected_and_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let manager = SettingsManager::with_overrides(path.clone(), EnvOverrides::default())
            .await
            .unwrap();

        let result = manager
            .update(AppConfig {
                rate_limit: Some(RateLimitSettings {
                    window_secs: 0,
                    max_requests: 1,
                    purge_interval_secs: 60,
                }),
                ..AppConfig::default()
            })
            .await;
        assert!(result.is_err());
        assert_eq!(manager.get().await.rate_limit.window_secs, 60);

        let on_disk: PersistedAppConfig =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.rate_limit.window_secs, 60);
    }

    #[tokio::test]
    async fn test_preview_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let manager = SettingsManager::with_overrides(path.clone(), EnvOverrides::default())
            .await
            .unwrap();

        let preview = manager
            .preview(AppConfig {
                stats: Some(StatsSettings {
                    utc_offset_minutes: 0,
                }),
                ..AppConfig::default()
            })
            .await
            .unwrap();
        assert_eq!(preview.stats.utc_offset_minutes, 0);
        assert_eq!(manager.get().await.stats.utc_offset_minutes, 180);

        let on_disk: PersistedAppConfig =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.stats.utc_offset_minutes, 180);
    }

    #[tokio::test]
    async fn test_env_overrides_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let overrides = EnvOverrides {
            email_api_key: Some("re_env".to_string()),
            ..EnvOverrides::default()
        };
        let manager = SettingsManager::with_overrides(path.clone(), overrides)
            .await
            .unwrap();

        let config = manager.get().await;
        assert_eq!(config.email.api_key.as_deref(), Some("re_env"));

        manager
            .update(AppConfig {
                email: Some(EmailSettings {
                    from_address: "Aqar <team@aqar-match.sa>".to_string(),
                    ..redacted(config).email
                }),
                ..AppConfig::default()
            })
            .await
            .unwrap();

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(!on_disk.contains("re_env"));
        assert!(on_disk.contains("team@aqar-match.sa"));
        assert_eq!(manager.get().await.email.api_key.as_deref(), Some("re_env"));
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let manager = SettingsManager::with_overrides(path, EnvOverrides::default())
            .await
            .unwrap();
        assert_eq!(manager.get().await.server.bind, "0.0.0.0:8080");
    }
}

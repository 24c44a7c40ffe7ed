// 市场领域管理器
//
// 负责首页实时统计与匹配评分配置

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::models::MatchingSettings;
use crate::stats::StatsEngine;

/// 市场领域管理器
#[derive(Clone)]
pub struct MarketDomain {
    stats: Arc<RwLock<Arc<StatsEngine>>>,
    matching: Arc<RwLock<MatchingSettings>>,
}

impl MarketDomain {
    pub fn new(stats: StatsEngine, matching: MatchingSettings) -> Self {
        Self {
            stats: Arc::new(RwLock::new(Arc::new(stats))),
            matching: Arc::new(RwLock::new(matching)),
        }
    }

    /// 获取当前统计生成器
    pub async fn get_stats(&self) -> Arc<StatsEngine> {
        self.stats.read().await.clone()
    }

    /// 获取匹配配置
    pub async fn get_matching(&self) -> MatchingSettings {
        self.matching.read().await.clone()
    }

    /// 时区偏移变更后替换统计生成器
    pub async fn install_stats(&self, engine: StatsEngine) {
        info!("统计时区偏移更新为 {} 分钟", engine.utc_offset_minutes());
        *self.stats.write().await = Arc::new(engine);
    }

    pub async fn apply_matching_settings(&self, settings: MatchingSettings) {
        *self.matching.write().await = settings;
    }
}

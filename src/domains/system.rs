// 系统领域管理器
//
// 负责配置、服务计数和内存日志
// 包含 SettingsManager、ServiceStatusHandle 和 LogBuffer 三个核心组件

use std::sync::Arc;
use std::time::Instant;

use crate::actors::ServiceStatusHandle;
use crate::logger::LogBuffer;
use crate::settings::SettingsManager;

/// 系统领域管理器 - 负责配置、状态和日志
#[derive(Clone)]
pub struct SystemDomain {
    settings: Arc<SettingsManager>,
    status: ServiceStatusHandle,
    log_buffer: Arc<LogBuffer>,
    started_at: Instant,
}

impl SystemDomain {
    /// 创建新的系统领域管理器
    pub fn new(
        settings: Arc<SettingsManager>,
        status: ServiceStatusHandle,
        log_buffer: Arc<LogBuffer>,
    ) -> Self {
        Self {
            settings,
            status,
            log_buffer,
            started_at: Instant::now(),
        }
    }

    /// 获取配置管理器
    pub fn get_settings(&self) -> &Arc<SettingsManager> {
        &self.settings
    }

    /// 获取服务状态Handle
    pub fn get_status(&self) -> &ServiceStatusHandle {
        &self.status
    }

    /// 获取内存日志
    pub fn get_logs(&self) -> &Arc<LogBuffer> {
        &self.log_buffer
    }

    /// 运行时长（秒）
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

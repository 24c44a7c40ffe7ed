// 自定义日志层 - 将最近的日志保留在内存中，供后台接口查看

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use crate::models::LoggerSettings;

/// 日志文件名前缀（按天轮转）
pub const LOG_FILE_NAME: &str = "aqar-match.log";

/// 日志消息
#[derive(Clone, Debug, serde::Serialize)]
pub struct LogMessage {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
}

struct BufferState {
    entries: VecDeque<LogMessage>,
    capacity: usize,
    enabled: bool,
}

/// 内存日志环形缓冲区
pub struct LogBuffer {
    state: RwLock<BufferState>,
}

impl LogBuffer {
    pub fn new(capacity: usize, enabled: bool) -> Self {
        Self {
            state: RwLock::new(BufferState {
                entries: VecDeque::with_capacity(capacity.min(1024)),
                capacity: capacity.max(1),
                enabled,
            }),
        }
    }

    pub fn from_settings(settings: &LoggerSettings) -> Self {
        Self::new(settings.buffer_capacity, settings.enable_admin_buffer)
    }

    /// 设置开关与容量，缩容时丢弃最旧的日志
    pub fn configure(&self, settings: &LoggerSettings) {
        if let Ok(mut state) = self.state.write() {
            state.enabled = settings.enable_admin_buffer;
            state.capacity = settings.buffer_capacity.max(1);
            if !state.enabled {
                state.entries.clear();
            }
            while state.entries.len() > state.capacity {
                state.entries.pop_front();
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().map(|s| s.enabled).unwrap_or(false)
    }

    pub fn push(&self, log: LogMessage) {
        if let Ok(mut state) = self.state.write() {
            if !state.enabled {
                return;
            }
            if state.entries.len() >= state.capacity {
                state.entries.pop_front();
            }
            state.entries.push_back(log);
        }
    }

    /// 最近的日志（按时间正序），可按最低级别过滤
    pub fn recent(&self, limit: usize, min_level: Option<Level>) -> Vec<LogMessage> {
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };
        let mut logs: Vec<LogMessage> = state
            .entries
            .iter()
            .rev()
            .filter(|log| match min_level {
                // tracing 中越严重的级别越“小”
                Some(min) => log.level.parse::<Level>().map(|l| l <= min).unwrap_or(true),
                None => true,
            })
            .take(limit)
            .cloned()
            .collect();
        logs.reverse();
        logs
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 自定义日志层
pub struct LogBufferLayer {
    buffer: Arc<LogBuffer>,
}

impl LogBufferLayer {
    pub fn new(buffer: Arc<LogBuffer>) -> Self {
        Self { buffer }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogBufferLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !self.buffer.is_enabled() {
            return;
        }

        let metadata = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut message = visitor.message;
        if !visitor.fields.is_empty() {
            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(&visitor.fields.join(" "));
        }

        self.buffer.push(LogMessage {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message,
        });
    }
}

/// 初始化日志系统：控制台 + 按天轮转文件 + 内存缓冲
///
/// 返回的 guard 需要保持到进程退出，否则文件日志会丢失。
pub fn init(settings: &LoggerSettings, buffer: Arc<LogBuffer>) -> Result<WorkerGuard> {
    use tracing_subscriber::fmt::time::LocalTime;
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    let log_dir = Path::new(&settings.log_dir);
    std::fs::create_dir_all(log_dir)?;

    // 配置日志输出到文件（每天轮转）
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // 同时输出到控制台和文件
    let writer = std::io::stdout.and(non_blocking);

    let timer = LocalTime::new(time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    )?);

    let level = settings.level.parse::<Level>().unwrap_or(Level::INFO);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_timer(timer)
        .with_ansi(cfg!(debug_assertions))
        .finish()
        .with(LogBufferLayer::new(buffer));

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("日志系统初始化失败: {}", e))?;

    eprintln!("日志文件位置: {:?}", log_dir);
    Ok(guard)
}

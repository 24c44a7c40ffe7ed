//! 邮件通知
//!
//! 密码重置属于关键邮件，发送失败要返回给调用方；欢迎邮件失败只记录警告。

pub mod client;
pub mod templates;

pub use client::{HttpMailer, LogMailer};

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::actors::{ServiceStatusHandle, StatusEvent};
use crate::models::EmailSettings;
use crate::utils::validation::{validate_email, validate_reset_token};

/// 待发送的邮件
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// 邮件发送通道
#[async_trait]
pub trait Mailer: Send + Sync {
    /// 发送邮件，返回服务商消息 ID
    async fn send(&self, message: &EmailMessage) -> Result<String>;

    fn name(&self) -> &str;
}

/// 根据配置选择邮件通道：有 API Key 时走 HTTP，否则只写日志
pub fn build_mailer(settings: &EmailSettings) -> Result<Arc<dyn Mailer>> {
    let has_key = settings
        .api_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty());

    if has_key {
        Ok(Arc::new(HttpMailer::new(settings)?))
    } else {
        warn!("未配置邮件 API Key，邮件只会写入日志");
        Ok(Arc::new(LogMailer))
    }
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("تعذر إرسال البريد الإلكتروني، حاول مرة أخرى لاحقاً")]
    Delivery(#[source] anyhow::Error),
}

/// 通知服务
pub struct NotificationService {
    mailer: RwLock<Arc<dyn Mailer>>,
    status: ServiceStatusHandle,
    app_base_url: RwLock<String>,
}

impl NotificationService {
    pub fn new(mailer: Arc<dyn Mailer>, status: ServiceStatusHandle, app_base_url: String) -> Self {
        Self {
            mailer: RwLock::new(mailer),
            status,
            app_base_url: RwLock::new(app_base_url),
        }
    }

    /// 配置变更后替换邮件通道
    pub async fn apply_settings(&self, settings: &EmailSettings) -> Result<()> {
        let mailer = build_mailer(settings)?;
        self.install(mailer, settings.app_base_url.clone()).await;
        Ok(())
    }

    /// 安装已构建好的邮件通道
    pub async fn install(&self, mailer: Arc<dyn Mailer>, app_base_url: String) {
        info!("邮件通道切换为 {}", mailer.name());
        *self.mailer.write().await = mailer;
        *self.app_base_url.write().await = app_base_url;
    }

    pub async fn mailer_name(&self) -> String {
        self.mailer.read().await.name().to_string()
    }

    async fn deliver(&self, message: &EmailMessage) -> Result<String> {
        let mailer = self.mailer.read().await.clone();
        match mailer.send(message).await {
            Ok(id) => {
                self.status.record(StatusEvent::EmailSent).await;
                Ok(id)
            }
            Err(e) => {
                self.status
                    .record(StatusEvent::EmailFailed {
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// 发送密码重置邮件，失败时返回错误
    pub async fn send_password_reset(
        &self,
        to: &str,
        name: Option<&str>,
        token: &str,
    ) -> Result<String, MailError> {
        validate_email(to).map_err(MailError::InvalidInput)?;
        validate_reset_token(token).map_err(MailError::InvalidInput)?;

        let base = self.app_base_url.read().await.clone();
        let link = format!("{}/reset-password?token={}", base.trim_end_matches('/'), token);
        let rendered = templates::password_reset(name, &link);
        let message = EmailMessage {
            to: to.trim().to_string(),
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
        };

        self.deliver(&message).await.map_err(|e| {
            tracing::error!("密码重置邮件发送失败: {}", e);
            MailError::Delivery(e)
        })
    }

    /// 发送欢迎邮件，失败只记录警告
    pub async fn send_welcome(&self, to: &str, name: Option<&str>) {
        if let Err(e) = validate_email(to) {
            warn!("欢迎邮件收件人无效，跳过: {}", e);
            return;
        }

        let base = self.app_base_url.read().await.clone();
        let rendered = templates::welcome(name, &base);
        let message = EmailMessage {
            to: to.trim().to_string(),
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
        };

        if let Err(e) = self.deliver(&message).await {
            warn!("欢迎邮件发送失败（忽略）: {}", e);
        }
    }
}

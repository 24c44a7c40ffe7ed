// 邮件服务商客户端
// HttpMailer 调用事务邮件接口，LogMailer 在未配置密钥时只写日志

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::{EmailMessage, Mailer};
use crate::models::EmailSettings;

/// 构造请求体
fn build_payload(from: &str, message: &EmailMessage) -> Value {
    json!({
        "from": from,
        "to": [message.to],
        "subject": message.subject,
        "html": message.html,
        "text": message.text,
    })
}

/// 事务邮件 HTTP 客户端
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(settings: &EmailSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("邮件 API Key 不能为空"))?;
        HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| anyhow!("邮件 API Key 包含非法字符"))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            api_url: settings.api_url.clone(),
            api_key: api_key.to_string(),
            from: settings.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<String> {
        let idempotency_key = Uuid::new_v4().to_string();

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Idempotency-Key", &idempotency_key)
            .json(&build_payload(&self.from, message))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("邮件服务返回错误 {}: {}", status, error_text);
            return Err(anyhow!("邮件发送失败: {} {}", status, error_text));
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message_id = body["id"]
            .as_str()
            .map(str::to_string)
            .unwrap_or(idempotency_key);

        info!("邮件已发送: {} (id={})", message.subject, message_id);
        Ok(message_id)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// 只写日志的邮件实现（开发环境 / 未配置密钥）
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        info!(
            "未配置邮件服务，跳过发送: to={} subject={} id={}",
            message.to, message.subject, id
        );
        Ok(id)
    }

    fn name(&self) -> &str {
        "log"
    }
}

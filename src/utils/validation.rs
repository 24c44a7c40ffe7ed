//! 输入验证工具函数
//!
//! 提供请求参数的验证功能，防止无效输入进入邮件与地理编码流程

use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};
use regex::Regex;

/// 无法识别客户端时使用的限流标识
pub const ANONYMOUS_CLIENT: &str = "anonymous";

const MAX_EMAIL_LEN: usize = 254;
const MAX_TOKEN_LEN: usize = 256;

fn email_regex() -> Option<&'static Regex> {
    static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$").ok()
        })
        .as_ref()
}

/// 验证邮箱地址
///
/// # 参数
/// - `email`: 收件人地址
///
/// # 返回
/// - `Ok(())`: 验证通过
/// - `Err(String)`: 错误信息
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("البريد الإلكتروني مطلوب".to_string());
    }
    if email.len() > MAX_EMAIL_LEN || !email_regex().is_some_and(|re| re.is_match(email)) {
        return Err(format!("البريد الإلكتروني غير صالح: {}", email));
    }
    Ok(())
}

/// 验证密码重置令牌（只允许 URL 安全字符，直接拼接进链接）
pub fn validate_reset_token(token: &str) -> Result<(), String> {
    if token.is_empty() || token.len() > MAX_TOKEN_LEN {
        return Err("رمز إعادة التعيين غير صالح".to_string());
    }
    if !token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err("رمز إعادة التعيين يحتوي على أحرف غير مسموحة".to_string());
    }
    Ok(())
}

/// 连接对端地址（服务以 `into_make_service_with_connect_info` 启动时存在）
pub fn peer_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// 请求是否携带代理转发头
pub fn has_forwarded_headers(headers: &HeaderMap) -> bool {
    headers.contains_key("x-forwarded-for") || headers.contains_key("x-real-ip")
}

/// 提取限流用的客户端标识
///
/// 只有 `trust_forwarded` 为真（服务部署在会覆盖这些头的可信代理之后）时才读取
/// X-Forwarded-For 第一项与 X-Real-IP，否则只用连接对端地址。
pub fn client_key(headers: &HeaderMap, peer: Option<IpAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let real_ip = || {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = forwarded.or_else(real_ip) {
            return key.to_string();
        }
    }

    peer.map(|ip| ip.to_string())
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_string())
}

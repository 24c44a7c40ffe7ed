// 邮件模板（阿拉伯语，RTL）

/// 渲染后的邮件内容
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// 转义 HTML 特殊字符
pub fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn greeting(name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("مرحباً {}،", name),
        None => "مرحباً،".to_string(),
    }
}

fn wrap_html(body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"ar\" dir=\"rtl\"><body style=\"font-family: Tahoma, Arial, sans-serif; line-height: 1.8;\">{}<p>فريق عقار ماتش</p></body></html>",
        body
    )
}

pub fn password_reset(name: Option<&str>, reset_link: &str) -> RenderedEmail {
    let greeting_text = greeting(name);
    let html_body = format!(
        "<p>{}</p><p>تلقينا طلباً لإعادة تعيين كلمة المرور الخاصة بحسابك.</p>\
         <p><a href=\"{}\">إعادة تعيين كلمة المرور</a></p>\
         <p>ينتهي هذا الرابط خلال ساعة واحدة. إذا لم تطلب ذلك فتجاهل هذه الرسالة.</p>",
        html_escape(&greeting_text),
        html_escape(reset_link)
    );

    RenderedEmail {
        subject: "إعادة تعيين كلمة المرور".to_string(),
        html: wrap_html(&html_body),
        text: format!(
            "{}\n\nتلقينا طلباً لإعادة تعيين كلمة المرور الخاصة بحسابك.\n{}\n\nينتهي هذا الرابط خلال ساعة واحدة.",
            greeting_text, reset_link
        ),
    }
}

pub fn welcome(name: Option<&str>, app_url: &str) -> RenderedEmail {
    let greeting_text = greeting(name);
    let html_body = format!(
        "<p>{}</p><p>أهلاً بك في عقار ماتش. سنرسل لك العقارات التي تطابق تفضيلاتك فور توفرها.</p>\
         <p><a href=\"{}\">تصفح العقارات</a></p>",
        html_escape(&greeting_text),
        html_escape(app_url)
    );

    RenderedEmail {
        subject: "أهلاً بك في عقار ماتش".to_string(),
        html: wrap_html(&html_body),
        text: format!(
            "{}\n\nأهلاً بك في عقار ماتش. سنرسل لك العقارات التي تطابق تفضيلاتك فور توفرها.\n{}",
            greeting_text, app_url
        ),
    }
}

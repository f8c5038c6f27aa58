//! 响应后处理：把 HTML 页面中的 CSRF 占位符替换为当前会话的令牌。
//!
//! 总是在路由自定义的后处理回调之后执行，应用提供的文本无法绕过这一步。

use crate::param::{CSRF_PLACEHOLDER, CSRF_QUOTED_PLACEHOLDER, CSRF_VALUE_PLACEHOLDER};

/// 路由自定义的后处理回调，输入页面文本，输出替换后的文本
pub type PostProcess = std::sync::Arc<dyn Fn(&str) -> String + Send + Sync>;

/// 携带令牌的隐藏表单字段
pub fn hidden_field(field: &str, token: &str) -> String {
    format!(
        r#"<input type="hidden" name="{}" id="{}" value="{}" />"#,
        field, field, token
    )
}

/// 依次替换隐藏字段占位符、带引号的值占位符和裸值占位符
pub fn substitute_csrf(html: &str, field: &str, token: &str) -> String {
    html.replace(CSRF_PLACEHOLDER, &hidden_field(field, token))
        .replace(CSRF_QUOTED_PLACEHOLDER, &format!("\"{}\"", token))
        .replace(CSRF_VALUE_PLACEHOLDER, token)
}

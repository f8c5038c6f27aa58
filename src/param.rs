// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了 `sitegate` 在请求分发流水线中用到的常量和强类型枚举，包括：
//! - 常见的 HTTP 状态码及其原因短语（Reason Phrase）。
//! - 受支持的 HTTP 方法（GET / POST / PUT / DELETE）与压缩编码。
//! - CSRF 字段名与页面占位符。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "sitegate";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 站点根路径被请求时实际路由到的页面
pub const INDEX_PAGE: &str = "/index.html";

/// 默认的 CSRF 表单字段名
pub const DEFAULT_CSRF_FIELD: &str = "__CSRFToken__";

/// 页面中被替换为隐藏表单字段的占位符
pub const CSRF_PLACEHOLDER: &str = "@CSRF@";

/// 页面中被替换为带双引号令牌值的占位符（用于内嵌 JSON / 脚本）
pub const CSRF_QUOTED_PLACEHOLDER: &str = "@CSRFValueQuoted@";

/// 页面中被替换为裸令牌值的占位符
pub const CSRF_VALUE_PLACEHOLDER: &str = "@CSRFValue@";

lazy_static! {
    /// 流水线会产生的 HTTP 状态码与其原因短语。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(302, "Found");
        map.insert(303, "See Other");
        map.insert(400, "Bad Request");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(413, "Content Too Large");
        map.insert(415, "Unsupported Media Type");
        map.insert(500, "Internal Server Error");
        map.insert(503, "Service Unavailable");
        map
    };
}

/// 返回状态码对应的原因短语，未登记的状态码返回空串
pub fn reason_phrase(code: u16) -> &'static str {
    STATUS_CODES.get(&code).copied().unwrap_or("")
}

/// 路由表接受的 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    /// 获取资源
    Get,
    /// 提交表单或执行操作
    Post,
    /// 更新资源（演示中用于 AJAX 调用）
    Put,
    /// 删除资源
    Delete,
}

impl HttpVerb {
    /// 路由比较时使用的小写形式
    pub fn as_lowercase(&self) -> &'static str {
        match *self {
            HttpVerb::Get => "get",
            HttpVerb::Post => "post",
            HttpVerb::Put => "put",
            HttpVerb::Delete => "delete",
        }
    }
}

impl FromStr for HttpVerb {
    type Err = ();

    /// 大小写不敏感地解析方法名
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "get" => Ok(HttpVerb::Get),
            "post" => Ok(HttpVerb::Post),
            "put" => Ok(HttpVerb::Put),
            "delete" => Ok(HttpVerb::Delete),
            _ => Err(()),
        }
    }
}

impl fmt::Display for HttpVerb {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVerb::Get => write!(f, "GET"),
            HttpVerb::Post => write!(f, "POST"),
            HttpVerb::Put => write!(f, "PUT"),
            HttpVerb::Delete => write!(f, "DELETE"),
        }
    }
}

/// 支持的内容编码（压缩）格式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpEncoding {
    /// GNU zip 压缩
    Gzip,
    /// zlib 压缩
    Deflate,
    /// Brotli 压缩
    Br,
}

impl fmt::Display for HttpEncoding {
    /// 将枚举格式化为 `Content-Encoding` 头所使用的标识符
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpEncoding::Gzip => write!(f, "gzip"),
            HttpEncoding::Deflate => write!(f, "deflate"),
            HttpEncoding::Br => write!(f, "br"),
        }
    }
}

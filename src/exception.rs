// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了请求分发流水线中的两类错误：
//! - `Exception`：单个请求处理失败时的封闭分类，挂在响应描述上，由连接层转换为重定向；
//! - `StartupError`：启动阶段的配置错误，必须在开始监听之前暴露出来。

use std::fmt;
use std::io;

use crate::param::HttpVerb;

/// 请求处理失败时的错误分类。
///
/// 处理器和加载器的失败都在本地被捕获并转换为该枚举，而不是向连接层抛出。
/// 正常（OK）的结果不在这里表示：没有分类的响应就是 OK。
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Exception {
    /// 会话已超过空闲时限，认证状态已被清除。
    ExpiredSession,
    /// 路由要求认证，但会话尚未认证。
    NotAuthorized,
    /// 静态资源（图片、样式、脚本）不存在。对应 `404 Not Found`，不会被转换为重定向。
    FileNotFound,
    /// 页面不存在。与静态资源的 404 区分开，会被转换为重定向。
    PageNotFound,
    /// 处理器或加载器内部出错。
    ServerError,
    /// 请求路径的扩展名不在扩展名内容表中。
    UnknownType,
    /// CSRF 令牌不匹配（严格模式下还包括缺失）。
    ValidationError,
    /// AJAX 处理器报告的失败。
    AjaxError,
}

use Exception::*;

impl Exception {
    /// 封闭分类中的全部取值，便于错误映射表做穷尽检查
    pub const ALL: [Exception; 8] = [
        ExpiredSession,
        NotAuthorized,
        FileNotFound,
        PageNotFound,
        ServerError,
        UnknownType,
        ValidationError,
        AjaxError,
    ];
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiredSession => write!(f, "Session expired"),
            NotAuthorized => write!(f, "Not authorized"),
            FileNotFound => write!(f, "File not found (404)"),
            PageNotFound => write!(f, "Page not found"),
            ServerError => write!(f, "Server error"),
            UnknownType => write!(f, "Unknown content type"),
            ValidationError => write!(f, "Request validation failed"),
            AjaxError => write!(f, "Ajax handler failed"),
        }
    }
}

/// 启动阶段的错误。任何一种都会让服务器在监听之前退出。
#[derive(Debug)]
pub enum StartupError {
    /// 同一个 (方法, 路径) 被注册了两次。
    DuplicateRoute { verb: HttpVerb, path: String },
    /// 连接闸门的许可数为 0，服务器永远无法接收连接。
    NoPermits,
    /// 配置文件无法读取或解析。
    Config(String),
    /// 无法绑定监听地址。
    Bind(io::Error),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::DuplicateRoute { verb, path } => {
                write!(f, "Route {} {} is registered more than once", verb, path)
            }
            StartupError::NoPermits => write!(f, "Connection gate needs at least one permit"),
            StartupError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            StartupError::Bind(e) => write!(f, "Failed to bind: {}", e),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::Bind(e) => Some(e),
            _ => None,
        }
    }
}

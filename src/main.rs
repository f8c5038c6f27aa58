// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 演示服务器
//!
//! 载入配置与日志，注册演示路由，然后启动 `sitegate` 的接收循环。
//! 演示路由覆盖了三种授权策略、CSRF 保护的表单提交以及 AJAX 调用。

use std::sync::Arc;

use chrono::Utc;
use log::{error, info};
use serde_json::json;
use tokio::runtime::Builder;

use sitegate::{
    postprocess::PostProcess, Config, Exception, FsSource, HttpVerb, Response, RouteHandler,
    RouteTable, Router, Server, StartupError,
};

fn main() {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法载入日志配置 config/log4rs.yaml：{}", e);
    }

    // 2. 环境配置加载：从 TOML 文件读取运行参数
    let config = match Config::from_toml("config/development.toml") {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    info!("配置文件已载入，www root: {}", config.www_root());

    // 3. 异步运行时定制：根据配置文件分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建运行时：{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(config)) {
        error!("服务器启动失败：{}", e);
        eprintln!("服务器启动失败：{}", e);
        std::process::exit(1);
    }
}

async fn serve(config: Config) -> Result<(), StartupError> {
    let routes = demo_routes(config.session_timeout_seconds())?;
    info!("已注册{}条路由", routes.len());

    let source = Arc::new(FsSource::new(config.cache_size()));
    let router = Router::new(routes, source, Arc::new(error_target), &config);
    let server = Arc::new(Server::new(config.clone(), router)?);
    let listener = Server::bind(&config).await?;
    info!("最大并发连接数：{}", server.gate().max_connections());

    server
        .run(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("无法监听停机信号：{}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(())
}

/// 错误分类 → 错误页
fn error_target(exception: Exception) -> String {
    match exception {
        Exception::ExpiredSession => "/error/expired",
        Exception::NotAuthorized => "/error/unauthorized",
        Exception::PageNotFound | Exception::FileNotFound => "/error/notfound",
        Exception::ValidationError => "/error/validation",
        Exception::UnknownType => "/error/unknowntype",
        Exception::ServerError | Exception::AjaxError => "/error/server",
    }
    .to_string()
}

fn demo_routes(timeout_seconds: u64) -> Result<RouteTable, StartupError> {
    let mut routes = RouteTable::new();

    routes.register(
        HttpVerb::Get,
        "/demo/login",
        RouteHandler::anonymous(|session, params| {
            let user = params.get("user").map(String::as_str).unwrap_or("demo");
            session.set_authenticated(true);
            session.set_value("user", user);
            Some(Response::redirect("/demo/secret"))
        }),
        None,
    )?;

    routes.register(
        HttpVerb::Get,
        "/demo/logout",
        RouteHandler::anonymous(|session, _| {
            session.set_authenticated(false);
            session.remove_value("user");
            Some(Response::redirect("/"))
        }),
        None,
    )?;

    // 只为静态页面加一道授权检查，内容仍由页面加载器提供
    let stamp: PostProcess =
        Arc::new(|html: &str| html.replace("@SERVER_TIME@", &Utc::now().to_rfc2822()));
    routes.register(
        HttpVerb::Get,
        "/demo/secret",
        RouteHandler::authenticated_fresh(timeout_seconds, |_, _| None),
        Some(stamp),
    )?;

    routes.register(
        HttpVerb::Post,
        "/demo/redirect",
        RouteHandler::authenticated_fresh(timeout_seconds, |_, _| {
            Some(Response::redirect("/demo/clicked"))
        }),
        None,
    )?;

    routes.register(
        HttpVerb::Put,
        "/demo/ajax",
        RouteHandler::anonymous(|_, params| match params.get("number") {
            Some(number) => Some(Response::text(format!("You said {}", number), "text/plain")),
            None => Some(Response::error(Exception::AjaxError)),
        }),
        None,
    )?;

    routes.register(
        HttpVerb::Get,
        "/demo/whoami",
        RouteHandler::anonymous(|session, _| {
            let body = json!({
                "address": session.address().to_string(),
                "authenticated": session.is_authenticated(),
                "user": session.value("user"),
                "lastActivity": session.last_activity().to_rfc3339(),
            });
            Some(Response::text(body.to_string(), "application/json"))
        }),
        None,
    )?;

    Ok(routes)
}

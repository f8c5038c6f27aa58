// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 服务器主循环
//!
//! 接收循环 → 连接闸门准入 → 独立任务中捕获请求并释放许可 → 会话解析 → 路由 →
//! 错误分类转换为重定向 → 写回响应。
//!
//! 单个请求的失败只会影响它自己的连接，不会让接收循环退出。

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};

use crate::{
    config::Config,
    exception::{Exception, StartupError},
    gate::{Admission, ConnectionGate},
    param::{HttpEncoding, HttpVerb},
    request::{read_request, Params, Request, RequestError},
    response::{HttpResponse, Response},
    router::Router,
    session::{lock_session, SessionStore},
};

pub struct Server {
    config: Arc<Config>,
    gate: ConnectionGate,
    sessions: Arc<SessionStore>,
    router: Arc<Router>,
}

impl Server {
    pub fn new(config: Config, router: Router) -> Result<Self, StartupError> {
        let gate = ConnectionGate::new(config.max_connections())?;
        let sessions = Arc::new(SessionStore::new(config.csrf_field()));
        Ok(Self {
            config: Arc::new(config),
            gate,
            sessions,
            router: Arc::new(router),
        })
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn gate(&self) -> &ConnectionGate {
        &self.gate
    }

    /// 按配置绑定监听地址，`local` 为真时只监听回环地址
    pub async fn bind(config: &Config) -> Result<TcpListener, StartupError> {
        let address = match config.local() {
            true => Ipv4Addr::new(127, 0, 0, 1),
            false => Ipv4Addr::new(0, 0, 0, 0),
        };
        let socket = SocketAddrV4::new(address, config.port());
        let listener = TcpListener::bind(socket).await.map_err(StartupError::Bind)?;
        info!("服务端将在{}上监听Socket连接", socket);
        Ok(listener)
    }

    /// 接收循环，直到 `shutdown` 完成
    pub async fn run<F>(self: Arc<Self>, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut id: u128 = 0;

        loop {
            // 先取得许可，再接收连接
            let admission = tokio::select! {
                _ = &mut shutdown => break,
                admission = self.gate.admit() => match admission {
                    Some(a) => a,
                    None => break,
                },
            };

            let (stream, addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("接收连接失败：{}", e);
                        continue;
                    }
                },
            };
            debug!("[ID{}]新的连接：{}", id, addr);

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                server.handle_connection(stream, addr, admission, id).await;
            });
            id += 1;
        }

        info!("主循环接收到停机指令，正在退出...");
        self.gate.close();
    }

    async fn handle_connection(
        &self,
        mut stream: TcpStream,
        addr: SocketAddr,
        admission: Admission,
        id: u128,
    ) {
        let captured = read_request(&mut stream, self.config.max_request_bytes(), id).await;
        // 请求已捕获，立即归还许可
        admission.release();

        let request = match captured {
            Ok(request) => request,
            Err(RequestError::ConnectionClosed) => {
                debug!("[ID{}]客户端在请求完整前关闭了连接", id);
                return;
            }
            Err(RequestError::TooLarge) => {
                warn!("[ID{}]请求过大，返回413", id);
                write_response(&mut stream, HttpResponse::from_status_code(413), id).await;
                return;
            }
            Err(e) => {
                warn!("[ID{}]无法捕获请求：{}，返回400", id, e);
                write_response(&mut stream, HttpResponse::from_status_code(400), id).await;
                return;
            }
        };

        let start_time = Instant::now();
        let response = self.respond(&request, addr.ip(), id);
        debug!(
            "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
            id,
            start_time.elapsed().as_millis()
        );
        info!(
            "[ID{}] {}, {}, {}, {}, {}",
            id,
            addr.ip(),
            request.method(),
            request.path(),
            response.status_code(),
            request.user_agent(),
        );

        write_response(&mut stream, response, id).await;
    }

    /// 把捕获的请求转换为 HTTP 响应
    pub fn respond(&self, request: &Request, address: IpAddr, id: u128) -> HttpResponse {
        let verb = match request.verb() {
            Some(verb) => verb,
            None => {
                warn!("[ID{}]不支持的HTTP请求方法：{}", id, request.method());
                return HttpResponse::from_status_code(405);
            }
        };
        let params = request.params();
        let response = self.dispatch(verb, request.path(), &params, address, id);
        self.to_http(response, verb, request.accept_encoding(), id)
    }

    /// 会话解析 + 路由 + 刷新活动时间。
    ///
    /// 整个过程持有会话锁，同一地址的并发请求被串行化。CSRF 校验失败的请求不刷新活动时间。
    pub fn dispatch(
        &self,
        verb: HttpVerb,
        path: &str,
        params: &Params,
        address: IpAddr,
        id: u128,
    ) -> Response {
        let handle = self.sessions.resolve(address);
        let mut session = lock_session(&handle);
        let response = self.router.route(&mut session, verb, path, params, id);
        if response.classification() != Some(Exception::ValidationError) {
            session.touch();
        }
        response
    }

    /// 静态资源的 404 原样返回，其余错误分类经应用的映射转换为重定向
    fn to_http(
        &self,
        response: Response,
        verb: HttpVerb,
        accept_encoding: &[HttpEncoding],
        id: u128,
    ) -> HttpResponse {
        match response {
            Response::Content {
                body,
                content_type,
                charset,
            } => HttpResponse::from_content(&body, &content_type, charset.as_deref(), accept_encoding, id),
            Response::Redirect(target) => HttpResponse::redirect(&target, Some(verb)),
            Response::Error(Exception::FileNotFound) => HttpResponse::from_status_code(404),
            Response::Error(e) => {
                let target = self.router.error_target(e);
                info!("[ID{}]{}，重定向到 {}", id, e, target);
                HttpResponse::redirect(&target, Some(verb))
            }
        }
    }
}

/// 写回响应。写失败只记录日志并丢弃连接。
async fn write_response(stream: &mut TcpStream, response: HttpResponse, id: u128) {
    let bytes = response.as_bytes();
    debug!("[ID{}]发送全量响应，长度: {}", id, bytes.len());
    if let Err(e) = stream.write_all(&bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    if let Err(e) = stream.flush().await {
        error!("[ID{}]刷新响应失败: {}", id, e);
        return;
    }
    let _ = stream.shutdown().await;
}

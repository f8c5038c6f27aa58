// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求捕获模块
//!
//! 从 TCP 流中读取一个完整的请求（报文头 + 按 `Content-Length` 读取的请求体），
//! 并提取路由所需的最少信息：
//! 1. 请求方法、路径（`?` 之前的部分）与查询字符串；
//! 2. 请求体原始字节；
//! 3. `Accept-Encoding` 中客户端支持的压缩格式。
//!
//! 查询字符串与表单请求体使用同一套 `key=value&...` 解析规则，键冲突时请求体优先。

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use log::{debug, error};
use tokio::io::{AsyncRead, AsyncReadExt};
use url::form_urlencoded;

use crate::param::*;

/// 请求参数（查询字符串与表单请求体合并后的结果）
pub type Params = HashMap<String, String>;

/// 请求捕获阶段的错误
#[derive(Debug)]
pub enum RequestError {
    /// 报文头不是合法的 UTF-8
    NotUtf8,
    /// 请求行格式不正确
    MalformedRequestLine,
    /// 请求超过配置的最大字节数
    TooLarge,
    /// `Content-Length` 不是合法的非负整数
    InvalidContentLength,
    /// 客户端在发送完整请求前关闭了连接
    ConnectionClosed,
    /// 读取套接字失败
    Io(std::io::Error),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::NotUtf8 => write!(f, "Request head can't be parsed in UTF-8"),
            RequestError::MalformedRequestLine => write!(f, "Malformed request line"),
            RequestError::TooLarge => write!(f, "Request exceeds the configured size limit"),
            RequestError::InvalidContentLength => write!(f, "Invalid Content-Length header"),
            RequestError::ConnectionClosed => write!(f, "Connection closed before request completed"),
            RequestError::Io(e) => write!(f, "Failed to read request: {}", e),
        }
    }
}

impl std::error::Error for RequestError {}

/// 一个已捕获的请求
#[derive(Debug, Clone)]
pub struct Request {
    /// 原始请求方法文本
    method: String,
    /// `?` 之前的路径
    path: String,
    /// `?` 之后的查询字符串，不含 `?`
    query: String,
    /// 请求体原始字节
    body: Bytes,
    /// 客户端标识字符串
    user_agent: String,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
}

impl Request {
    /// 从报文头文本与请求体构建 `Request`
    pub fn parse(head: &str, body: Bytes, id: u128) -> Result<Self, RequestError> {
        let mut lines = head.split(CRLF);
        let request_line = lines.next().unwrap_or("");
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(RequestError::MalformedRequestLine);
        }

        let method = parts[0].to_string();
        let target = parts[1];
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (target.to_string(), String::new()),
        };

        let mut user_agent = String::new();
        let mut accept_encoding = vec![];
        for line in lines {
            let (name, value) = match line.split_once(':') {
                Some((n, v)) => (n.trim().to_lowercase(), v.trim()),
                None => continue,
            };
            match name.as_str() {
                "user-agent" => user_agent = value.to_string(),
                "accept-encoding" => {
                    for token in value.split(',') {
                        let token = token.split(';').next().unwrap_or("").trim();
                        let encoding = match token {
                            "gzip" => HttpEncoding::Gzip,
                            "deflate" => HttpEncoding::Deflate,
                            "br" => HttpEncoding::Br,
                            _ => continue,
                        };
                        if !accept_encoding.contains(&encoding) {
                            accept_encoding.push(encoding);
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            method,
            path,
            query,
            body,
            user_agent,
            accept_encoding,
        })
    }

    /// 合并查询字符串与表单请求体中的参数，值已做 URL 解码，请求体覆盖同名的查询参数
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        for (k, v) in form_urlencoded::parse(self.query.as_bytes()) {
            params.insert(k.into_owned(), v.into_owned());
        }
        for (k, v) in form_urlencoded::parse(&self.body) {
            params.insert(k.into_owned(), v.into_owned());
        }
        params
    }
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取原始请求方法文本
    pub fn method(&self) -> &str {
        &self.method
    }

    /// 解析后的请求方法，不在 GET/POST/PUT/DELETE 之内时为 `None`
    pub fn verb(&self) -> Option<HttpVerb> {
        self.method.parse().ok()
    }

    /// 获取请求路径（不含查询字符串）
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// 获取用户代理字符串
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// 获取客户端支持的压缩算法列表
    pub fn accept_encoding(&self) -> &[HttpEncoding] {
        &self.accept_encoding
    }
}

/// 从流中读取一个完整请求，总字节数不超过 `limit`
pub async fn read_request<R>(stream: &mut R, limit: usize, id: u128) -> Result<Request, RequestError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    // 1. 读取到报文头结束标记
    let head_end = loop {
        if let Some(pos) = find_head_end(&buffer) {
            break pos;
        }
        if buffer.len() >= limit {
            return Err(RequestError::TooLarge);
        }
        let n = stream.read(&mut chunk).await.map_err(RequestError::Io)?;
        if n == 0 {
            return Err(RequestError::ConnectionClosed);
        }
        buffer.extend_from_slice(&chunk[..n]);
    };

    let head = std::str::from_utf8(&buffer[..head_end]).map_err(|_| {
        error!("[ID{}]无法解析HTTP请求头", id);
        RequestError::NotUtf8
    })?;
    let content_length = content_length(head).map_err(|e| {
        error!("[ID{}]Content-Length 无法解析", id);
        e
    })?;
    let body_start = head_end + 4;
    let body_end = match body_start.checked_add(content_length) {
        Some(end) if end <= limit => end,
        _ => return Err(RequestError::TooLarge),
    };

    // 2. 按 Content-Length 读取请求体
    while buffer.len() < body_end {
        let n = stream.read(&mut chunk).await.map_err(RequestError::Io)?;
        if n == 0 {
            return Err(RequestError::ConnectionClosed);
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
    debug!("[ID{}]请求接收完毕，请求体 {} bytes", id, content_length);

    let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
    let body = Bytes::copy_from_slice(&buffer[body_start..body_end]);
    Request::parse(&head, body, id)
}

fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

/// 没有 `Content-Length` 时请求体长度为 0
fn content_length(head: &str) -> Result<usize, RequestError> {
    match head
        .split(CRLF)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
    {
        Some((_, value)) => value
            .trim()
            .parse()
            .map_err(|_| RequestError::InvalidContentLength),
        None => Ok(0),
    }
}

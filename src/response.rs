use crate::{exception::Exception, param::*};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::debug;

use std::io::{self, Write};

/// 路由器给出的响应描述。
///
/// 三种结果互斥：内容、重定向或错误分类，同一时刻只有一个有效。
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// 字节负载，附带内容类型与文本编码（二进制内容没有编码）
    Content {
        body: Bytes,
        content_type: String,
        charset: Option<String>,
    },
    /// 重定向目标
    Redirect(String),
    /// 正常内容解析失败时的错误分类
    Error(Exception),
}

impl Response {
    /// UTF-8 文本响应
    pub fn text(body: impl Into<String>, content_type: &str) -> Self {
        Response::Content {
            body: Bytes::from(body.into()),
            content_type: content_type.to_string(),
            charset: Some("utf-8".to_string()),
        }
    }

    /// HTML 页面响应
    pub fn html(body: impl Into<String>) -> Self {
        Self::text(body, "text/html")
    }

    /// 不带文本编码的二进制响应
    pub fn binary(body: Bytes, content_type: &str) -> Self {
        Response::Content {
            body,
            content_type: content_type.to_string(),
            charset: None,
        }
    }

    pub fn redirect(target: impl Into<String>) -> Self {
        Response::Redirect(target.into())
    }

    pub fn error(exception: Exception) -> Self {
        Response::Error(exception)
    }

    /// 错误分类；`None` 表示 OK
    pub fn classification(&self) -> Option<Exception> {
        match self {
            Response::Error(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_html(&self) -> bool {
        matches!(self, Response::Content { content_type, .. } if content_type == "text/html")
    }

    /// 内容响应的正文文本（仅用于 UTF-8 内容）
    pub fn body_text(&self) -> Option<&str> {
        match self {
            Response::Content { body, .. } => std::str::from_utf8(body).ok(),
            _ => None,
        }
    }
}

/// 写回套接字的 HTTP 报文
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_encoding: Option<HttpEncoding>,
    location: Option<String>,
    date: DateTime<Utc>,
    content: Bytes,
}

impl HttpResponse {
    fn with_code(code: u16) -> Self {
        Self {
            status_code: code,
            information: reason_phrase(code).to_string(),
            content_type: None,
            content_encoding: None,
            location: None,
            date: Utc::now(),
            content: Bytes::new(),
        }
    }

    /// 200 内容响应。可压缩的文本内容按客户端偏好压缩。
    pub fn from_content(
        body: &Bytes,
        content_type: &str,
        charset: Option<&str>,
        accept_encoding: &[HttpEncoding],
        id: u128,
    ) -> Self {
        let mut response = Self::with_code(200);
        response.content_type = Some(match charset {
            Some(c) => format!("{};charset={}", content_type, c),
            None => content_type.to_string(),
        });

        let encoding = if should_skip_compression(content_type) {
            None
        } else {
            decide_encoding(accept_encoding)
        };
        response.content = match compress(body.to_vec(), encoding) {
            Ok(compressed) => {
                response.content_encoding = encoding;
                Bytes::from(compressed)
            }
            Err(e) => {
                debug!("[ID{}]压缩失败，发送原始内容：{}", id, e);
                body.clone()
            }
        };
        response
    }

    /// 重定向。非 GET 请求使用 303，浏览器随后以 GET 访问目标。
    pub fn redirect(location: &str, verb: Option<HttpVerb>) -> Self {
        let code = match verb {
            Some(HttpVerb::Get) | None => 302,
            Some(_) => 303,
        };
        let mut response = Self::with_code(code);
        response.location = Some(location.to_string());
        response
    }

    /// 带简单 HTML 说明页的状态码响应
    pub fn from_status_code(code: u16) -> Self {
        let mut response = Self::with_code(code);
        let page = format!(
            r##"<!DOCTYPE html>
<html>
    <head>
        <meta charset="utf-8">
        <title>{code}</title>
    </head>
    <body>
        <h1>{code}</h1>
        <p>{info}</p>
    </body>
</html>"##,
            code = code,
            info = response.information
        );
        response.content_type = Some("text/html;charset=utf-8".to_string());
        response.content = Bytes::from(page);
        response
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let mut header = format!(
            "HTTP/1.1 {} {}{}",
            self.status_code, self.information, CRLF
        );
        if let Some(t) = &self.content_type {
            header.push_str(&format!("Content-Type: {}{}", t, CRLF));
        }
        if let Some(e) = self.content_encoding {
            header.push_str(&format!("Content-Encoding: {}{}", e, CRLF));
        }
        if let Some(l) = &self.location {
            header.push_str(&format!("Location: {}{}", l, CRLF));
        }
        header.push_str(&format!("Content-Length: {}{}", self.content.len(), CRLF));
        header.push_str(&format!("Date: {}{}", format_date(&self.date), CRLF));
        header.push_str(&format!("Server: {}{}", SERVER_NAME, CRLF));
        header.push_str(&format!("Connection: close{}", CRLF));
        header.push_str(CRLF);

        [header.as_bytes(), &self.content[..]].concat()
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    }
}

fn should_skip_compression(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
}

fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Br) {
        Some(HttpEncoding::Br)
    } else if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else {
        None
    }
}

//! 扩展名内容表：文件扩展名 → (MIME 类型, 默认加载策略)。
//!
//! 路由表未命中（或处理器放弃响应）时，路由器按这里的策略从磁盘加载内容。

use std::collections::HashMap;

use lazy_static::lazy_static;

/// 默认内容加载策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    /// 原样读取字节（图片、图标）
    Binary,
    /// 按 UTF-8 读取文本后重新编码为 UTF-8 字节（样式、脚本）
    Text,
    /// HTML 页面：映射到页面子目录并执行后处理
    Page,
}

/// 扩展名内容表中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentEntry {
    pub mime: &'static str,
    pub loader: Loader,
}

impl ContentEntry {
    /// 文本类内容携带的字符编码，二进制内容没有编码
    pub fn charset(&self) -> Option<&'static str> {
        match self.loader {
            Loader::Binary => None,
            Loader::Text | Loader::Page => Some("utf-8"),
        }
    }
}

lazy_static! {
    /// 默认绑定。空扩展名视为 HTML 页面（加载时补上 `.html`）。
    static ref EXTENSION_MAP: HashMap<&'static str, ContentEntry> = {
        let mut map = HashMap::new();
        let page = ContentEntry { mime: "text/html", loader: Loader::Page };
        map.insert("", page);
        map.insert("html", page);
        map.insert("css", ContentEntry { mime: "text/css", loader: Loader::Text });
        map.insert("js", ContentEntry { mime: "text/javascript", loader: Loader::Text });
        map.insert("ico", ContentEntry { mime: "image/x-icon", loader: Loader::Binary });
        map.insert("png", ContentEntry { mime: "image/png", loader: Loader::Binary });
        map.insert("jpg", ContentEntry { mime: "image/jpeg", loader: Loader::Binary });
        map.insert("gif", ContentEntry { mime: "image/gif", loader: Loader::Binary });
        map.insert("bmp", ContentEntry { mime: "image/bmp", loader: Loader::Binary });
        map
    };
}

/// 取路径最后一段中最后一个 `.` 之后的部分；没有 `.` 时返回空串。
pub fn extension_of(path: &str) -> &str {
    let last_segment = match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    };
    match last_segment.rfind('.') {
        Some(i) => &last_segment[i + 1..],
        None => "",
    }
}

/// 查找扩展名（需已转为小写）对应的内容项
pub fn lookup(extension: &str) -> Option<&'static ContentEntry> {
    EXTENSION_MAP.get(extension)
}

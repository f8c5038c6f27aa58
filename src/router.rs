// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由引擎
//!
//! 把一次请求 (会话, 方法, 路径, 参数) 解析为响应描述。
//!
//! ## 处理步骤
//! 1. 方法与路径统一转为小写。
//! 2. 非 GET 请求校验 CSRF 令牌，不匹配直接返回 `ValidationError`。
//! 3. 按路径最后一段的扩展名查扩展名内容表，查不到返回 `UnknownType`。
//! 4. 路由表精确匹配：命中则经授权策略调用处理器；处理器不给响应或未命中时，按扩展名的默认加载策略读取内容。
//! 5. HTML 页面先经路由自定义的后处理，再做 CSRF 占位符替换。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, warn};

use crate::{
    config::{Config, CsrfMode},
    exception::Exception,
    extension::{self, ContentEntry, Loader},
    handler::ErrorRedirect,
    param::{HttpVerb, INDEX_PAGE},
    postprocess::{substitute_csrf, PostProcess},
    request::Params,
    response::Response,
    route::RouteTable,
    session::Session,
    source::ContentSource,
};

pub struct Router {
    routes: RouteTable,
    source: Arc<dyn ContentSource>,
    on_error: ErrorRedirect,
    www_root: PathBuf,
    pages_dir: String,
    csrf_field: String,
    csrf_mode: CsrfMode,
}

impl Router {
    pub fn new(
        routes: RouteTable,
        source: Arc<dyn ContentSource>,
        on_error: ErrorRedirect,
        config: &Config,
    ) -> Self {
        Self {
            routes,
            source,
            on_error,
            www_root: PathBuf::from(config.www_root()),
            pages_dir: config.pages_dir().to_string(),
            csrf_field: config.csrf_field().to_string(),
            csrf_mode: config.csrf_mode(),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// 应用提供的错误分类 → 重定向路径 映射
    pub fn error_target(&self, exception: Exception) -> String {
        (self.on_error)(exception)
    }

    pub fn csrf_field(&self) -> &str {
        &self.csrf_field
    }

    /// 解析一次请求
    pub fn route(
        &self,
        session: &mut Session,
        verb: HttpVerb,
        path: &str,
        params: &Params,
        id: u128,
    ) -> Response {
        let path = path.to_lowercase();
        debug!("[ID{}]路由匹配开始: {} {}", id, verb.as_lowercase(), path);

        if let Err(e) = self.check_csrf(session, verb, params, id) {
            return Response::error(e);
        }
        self.resolve(session, verb, &path, params, id)
    }

    /// 非 GET 请求的 CSRF 校验。
    ///
    /// 字段缺失时，宽松模式只记录警告并放行，严格模式拒绝。
    pub fn check_csrf(
        &self,
        session: &Session,
        verb: HttpVerb,
        params: &Params,
        id: u128,
    ) -> Result<(), Exception> {
        if verb == HttpVerb::Get {
            return Ok(());
        }
        match params.get(&self.csrf_field) {
            Some(token) if tokens_match(token, session.token()) => Ok(()),
            Some(_) => {
                warn!("[ID{}]CSRF令牌不匹配，拒绝请求（会话 {}）", id, session.address());
                Err(Exception::ValidationError)
            }
            None => match self.csrf_mode {
                CsrfMode::Permissive => {
                    warn!(
                        "[ID{}]{}请求缺少CSRF字段 {}，该端点未受CSRF保护",
                        id, verb, self.csrf_field
                    );
                    Ok(())
                }
                CsrfMode::Strict => {
                    warn!("[ID{}]{}请求缺少CSRF字段 {}，严格模式下拒绝", id, verb, self.csrf_field);
                    Err(Exception::ValidationError)
                }
            },
        }
    }

    fn resolve(
        &self,
        session: &mut Session,
        verb: HttpVerb,
        path: &str,
        params: &Params,
        id: u128,
    ) -> Response {
        let entry = match extension::lookup(extension::extension_of(path)) {
            Some(entry) => entry,
            None => {
                warn!("[ID{}]无法识别的扩展名：{}", id, path);
                return Response::error(Exception::UnknownType);
            }
        };

        let route = self.routes.find(verb, path);
        let post_process = route.and_then(|r| r.post_process());
        if let Some(route) = route {
            debug!("[ID{}]命中路由 {} {}", id, verb, route.path());
            if let Some(response) = route.handler().invoke(session, params, &self.on_error) {
                if response.is_html() {
                    if let Some(text) = response.body_text() {
                        return Response::html(self.render_page(session, text, post_process));
                    }
                }
                return response;
            }
            debug!("[ID{}]处理器未给出响应，回落到默认内容加载", id);
        }

        self.load(session, entry, verb, path, params, post_process, id)
    }

    #[allow(clippy::too_many_arguments)]
    fn load(
        &self,
        session: &mut Session,
        entry: &ContentEntry,
        verb: HttpVerb,
        path: &str,
        params: &Params,
        post_process: Option<&PostProcess>,
        id: u128,
    ) -> Response {
        match entry.loader {
            Loader::Binary => match self.read(&self.www_root, path, id) {
                Some(bytes) => Response::binary(bytes, entry.mime),
                None => Response::error(Exception::FileNotFound),
            },
            Loader::Text => match self.read(&self.www_root, path, id) {
                Some(bytes) => Response::text(String::from_utf8_lossy(&bytes), entry.mime),
                None => Response::error(Exception::FileNotFound),
            },
            Loader::Page => {
                let trimmed = path.trim_end_matches('/');
                if trimmed.is_empty() {
                    debug!("[ID{}]站点根目录，转到 {}", id, INDEX_PAGE);
                    return self.resolve(session, verb, INDEX_PAGE, params, id);
                }
                let mut page = trimmed.to_string();
                if extension::extension_of(&page).is_empty() {
                    page.push_str(".html");
                }
                let pages_root = self.www_root.join(&self.pages_dir);
                match self.read(&pages_root, &page, id) {
                    Some(bytes) => {
                        let text = String::from_utf8_lossy(&bytes);
                        Response::html(self.render_page(session, &text, post_process))
                    }
                    None => Response::error(Exception::PageNotFound),
                }
            }
        }
    }

    /// 路由自定义后处理在前，CSRF 替换在后
    fn render_page(&self, session: &Session, text: &str, post_process: Option<&PostProcess>) -> String {
        match post_process {
            Some(f) => substitute_csrf(&f(text), &self.csrf_field, session.token()),
            None => substitute_csrf(text, &self.csrf_field, session.token()),
        }
    }

    fn read(&self, root: &Path, path: &str, id: u128) -> Option<Bytes> {
        let full_path = match safe_join(root, path) {
            Some(p) => p,
            None => {
                warn!("[ID{}]路径 {} 包含非法片段", id, path);
                return None;
            }
        };
        debug!("[ID{}]映射物理路径：{}", id, full_path.display());
        match self.source.load(&full_path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("[ID{}]无法读取 {}：{}", id, full_path.display(), e);
                None
            }
        }
    }
}

/// 令牌比较的耗时只取决于长度，不取决于第一个不同字节的位置
fn tokens_match(given: &str, expected: &str) -> bool {
    let (a, b) = (given.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 把请求路径拼接到根目录下，拒绝 `..` 片段
fn safe_join(root: &Path, path: &str) -> Option<PathBuf> {
    let mut full = root.to_path_buf();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || s.contains('\0') => return None,
            s => full.push(s),
        }
    }
    Some(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::RouteHandler;
    use crate::route::RouteTable;
    use std::collections::HashMap;
    use std::io;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Mutex;

    /// 内存中的内容来源，记录被读取过的路径
    #[derive(Default)]
    struct MemorySource {
        files: HashMap<PathBuf, Bytes>,
        reads: Mutex<Vec<PathBuf>>,
    }

    impl MemorySource {
        fn with(mut self, path: &str, content: &str) -> Self {
            self.files
                .insert(PathBuf::from(path), Bytes::copy_from_slice(content.as_bytes()));
            self
        }
    }

    impl ContentSource for MemorySource {
        fn load(&self, path: &Path) -> io::Result<Bytes> {
            self.reads.lock().unwrap().push(path.to_path_buf());
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.set_www_root("www");
        config
    }

    fn on_error() -> ErrorRedirect {
        Arc::new(|e| format!("/error/{:?}", e).to_lowercase())
    }

    fn router(routes: RouteTable, source: MemorySource) -> Router {
        Router::new(routes, Arc::new(source), on_error(), &config())
    }

    fn session() -> Session {
        Session::new(IpAddr::V4(Ipv4Addr::LOCALHOST), "__CSRFToken__")
    }

    #[test]
    fn test_root_routes_to_index() {
        let source = MemorySource::default().with("www/pages/index.html", "<form>@CSRF@</form>");
        let router = router(RouteTable::new(), source);
        let mut s = session();

        let response = router.route(&mut s, HttpVerb::Get, "/", &Params::new(), 0);
        let body = response.body_text().unwrap().to_string();
        assert!(response.is_html());
        assert!(body.contains(&format!("value=\"{}\"", s.token())));
        assert!(!body.contains("@CSRF@"));
    }

    #[test]
    fn test_extensionless_page_gets_html_suffix() {
        let source = MemorySource::default().with("www/pages/about.html", "<h1>About</h1>");
        let router = router(RouteTable::new(), source);
        let response = router.route(&mut session(), HttpVerb::Get, "/About", &Params::new(), 0);
        assert_eq!(response.body_text(), Some("<h1>About</h1>"));
    }

    #[test]
    fn test_missing_page_and_missing_asset_differ() {
        let router = router(RouteTable::new(), MemorySource::default());
        let mut s = session();
        assert_eq!(
            router.route(&mut s, HttpVerb::Get, "/nope.html", &Params::new(), 0),
            Response::error(Exception::PageNotFound)
        );
        assert_eq!(
            router.route(&mut s, HttpVerb::Get, "/img/nope.png", &Params::new(), 0),
            Response::error(Exception::FileNotFound)
        );
        assert_eq!(
            router.route(&mut s, HttpVerb::Get, "/css/nope.css", &Params::new(), 0),
            Response::error(Exception::FileNotFound)
        );
    }

    #[test]
    fn test_assets_served_from_site_root() {
        let source = MemorySource::default()
            .with("www/css/site.css", "h1{}")
            .with("www/img/logo.png", "PNG");
        let router = router(RouteTable::new(), source);
        let mut s = session();

        let css = router.route(&mut s, HttpVerb::Get, "/css/site.css", &Params::new(), 0);
        assert_eq!(css, Response::text("h1{}", "text/css"));
        let png = router.route(&mut s, HttpVerb::Get, "/img/logo.png", &Params::new(), 0);
        assert_eq!(png, Response::binary(Bytes::from_static(b"PNG"), "image/png"));
    }

    #[test]
    fn test_unknown_extension() {
        let router = router(RouteTable::new(), MemorySource::default());
        let response = router.route(&mut session(), HttpVerb::Get, "/data.json", &Params::new(), 0);
        assert_eq!(response, Response::error(Exception::UnknownType));
    }

    #[test]
    fn test_traversal_rejected() {
        let source = MemorySource::default().with("secret.png", "x");
        let router = router(RouteTable::new(), source);
        let response = router.route(&mut session(), HttpVerb::Get, "/../secret.png", &Params::new(), 0);
        assert_eq!(response, Response::error(Exception::FileNotFound));
    }

    #[test]
    fn test_csrf_mismatch_blocks_handler() {
        let mut routes = RouteTable::new();
        routes
            .register(
                HttpVerb::Post,
                "/demo/redirect",
                RouteHandler::anonymous(|_, _| panic!("handler must not run")),
                None,
            )
            .unwrap();
        let router = router(routes, MemorySource::default());

        let mut params = Params::new();
        params.insert("__CSRFToken__".to_string(), "stale".to_string());
        let response = router.route(&mut session(), HttpVerb::Post, "/demo/redirect", &params, 0);
        assert_eq!(response, Response::error(Exception::ValidationError));
    }

    #[test]
    fn test_csrf_missing_permissive_and_strict() {
        let mut routes = RouteTable::new();
        routes
            .register(
                HttpVerb::Put,
                "/demo/ajax",
                RouteHandler::anonymous(|_, _| Some(Response::text("ok", "text/plain"))),
                None,
            )
            .unwrap();

        let permissive = router(routes.clone(), MemorySource::default());
        let response = permissive.route(&mut session(), HttpVerb::Put, "/demo/ajax", &Params::new(), 0);
        assert_eq!(response, Response::text("ok", "text/plain"));

        let mut strict_config = config();
        strict_config.set_csrf_mode(CsrfMode::Strict);
        let strict = Router::new(routes, Arc::new(MemorySource::default()), on_error(), &strict_config);
        let response = strict.route(&mut session(), HttpVerb::Put, "/demo/ajax", &Params::new(), 0);
        assert_eq!(response, Response::error(Exception::ValidationError));
    }

    #[test]
    fn test_get_skips_csrf() {
        let source = MemorySource::default().with("www/pages/index.html", "home");
        let router = router(RouteTable::new(), source);
        let mut params = Params::new();
        params.insert("__CSRFToken__".to_string(), "wrong".to_string());
        let response = router.route(&mut session(), HttpVerb::Get, "/index.html", &params, 0);
        assert_eq!(response, Response::html("home"));
    }

    #[test]
    fn test_deferring_handler_falls_back_to_page() {
        let mut routes = RouteTable::new();
        let pp: PostProcess = Arc::new(|html: &str| html.replace("@USER@", "alice"));
        routes
            .register(
                HttpVerb::Get,
                "/demo/secret",
                RouteHandler::authenticated(|_, _| None),
                Some(pp),
            )
            .unwrap();
        let source = MemorySource::default()
            .with("www/pages/demo/secret.html", "<p>@USER@ @CSRFValue@</p>");
        let router = router(routes, source);

        let mut s = session();
        let denied = router.route(&mut s, HttpVerb::Get, "/demo/secret", &Params::new(), 0);
        assert_eq!(denied, Response::redirect("/error/notauthorized"));

        s.set_authenticated(true);
        let allowed = router.route(&mut s, HttpVerb::Get, "/demo/secret", &Params::new(), 0);
        assert_eq!(allowed, Response::html(format!("<p>alice {}</p>", s.token())));
    }

    #[test]
    fn test_post_process_cannot_hide_csrf_substitution() {
        let mut routes = RouteTable::new();
        let pp: PostProcess = Arc::new(|_: &str| "<p>@CSRFValue@</p>".to_string());
        routes
            .register(
                HttpVerb::Get,
                "/greeting",
                RouteHandler::anonymous(|_, _| Some(Response::html("<p>hi</p>"))),
                Some(pp),
            )
            .unwrap();
        let router = router(routes, MemorySource::default());
        let mut s = session();
        let response = router.route(&mut s, HttpVerb::Get, "/greeting", &Params::new(), 0);
        assert_eq!(response, Response::html(format!("<p>{}</p>", s.token())));
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("3f2a9c", "3f2a9c"));
        assert!(!tokens_match("3f2a9d", "3f2a9c"));
        assert!(!tokens_match("xf2a9c", "3f2a9c"));
        assert!(!tokens_match("3f2a9", "3f2a9c"));
        assert!(!tokens_match("", "3f2a9c"));
        assert!(tokens_match("", ""));
    }

    #[test]
    fn test_csrf_near_miss_token_rejected() {
        let router = router(RouteTable::new(), MemorySource::default());
        let s = session();
        let mut near = s.token().to_string();
        let last = if near.ends_with('0') { "1" } else { "0" };
        near.pop();
        near.push_str(last);

        let mut params = Params::new();
        params.insert("__CSRFToken__".to_string(), near);
        assert_eq!(
            router.check_csrf(&s, HttpVerb::Post, &params, 0),
            Err(Exception::ValidationError)
        );

        params.insert("__CSRFToken__".to_string(), s.token().to_string());
        assert_eq!(router.check_csrf(&s, HttpVerb::Post, &params, 0), Ok(()));
    }

    #[test]
    fn test_safe_join() {
        let root = Path::new("www");
        assert_eq!(safe_join(root, "/css/a.css"), Some(PathBuf::from("www/css/a.css")));
        assert_eq!(safe_join(root, "//x//./y.png"), Some(PathBuf::from("www/x/y.png")));
        assert_eq!(safe_join(root, "/a/../b.png"), None);
        assert_eq!(safe_join(root, "/a\\b.png"), None);
    }
}

//! 路由表：(方法, 路径) → 处理器。
//!
//! 启动时注册，开始服务后只读。路径比较大小写不敏感，重复注册在注册时即报错。

use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::{
    exception::StartupError,
    handler::RouteHandler,
    param::HttpVerb,
    postprocess::PostProcess,
};

/// 一条已注册的路由
#[derive(Clone)]
pub struct Route {
    verb: HttpVerb,
    path: String,
    handler: RouteHandler,
    post_process: Option<PostProcess>,
}

impl Route {
    pub fn verb(&self) -> HttpVerb {
        self.verb
    }

    /// 小写形式的路径
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler(&self) -> &RouteHandler {
        &self.handler
    }

    /// 路由自定义的页面后处理，在 CSRF 替换之前执行
    pub fn post_process(&self) -> Option<&PostProcess> {
        self.post_process.as_ref()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("handler", &self.handler)
            .field("post_process", &self.post_process.is_some())
            .finish()
    }
}

#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    routes: HashMap<(HttpVerb, String), Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册路由。同一 (方法, 路径) 已存在时返回 `StartupError::DuplicateRoute`。
    pub fn register(
        &mut self,
        verb: HttpVerb,
        path: &str,
        handler: RouteHandler,
        post_process: Option<PostProcess>,
    ) -> Result<(), StartupError> {
        let path = path.to_lowercase();
        let key = (verb, path.clone());
        if self.routes.contains_key(&key) {
            return Err(StartupError::DuplicateRoute { verb, path });
        }
        debug!("注册路由 {} {} ({:?})", verb, path, handler.policy());
        self.routes.insert(
            key,
            Route {
                verb,
                path,
                handler,
                post_process,
            },
        );
        Ok(())
    }

    /// 精确匹配 (方法, 路径)，路径大小写不敏感
    pub fn find(&self, verb: HttpVerb, path: &str) -> Option<&Route> {
        self.routes.get(&(verb, path.to_lowercase()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

//! 路由处理器：在应用回调外包一层授权策略。
//!
//! 三种策略由一个 `authorize` 函数统一判定：
//! - `Anonymous`：无条件调用回调；
//! - `Authenticated`：会话未认证时重定向到"未授权"错误页；
//! - `AuthenticatedFresh`：会话空闲超时先清除认证并重定向到"会话过期"错误页，否则按 `Authenticated` 处理。

use std::fmt;
use std::sync::Arc;

use log::{debug, info};

use crate::{exception::Exception, request::Params, response::Response, session::Session};

/// 应用回调。返回 `None` 表示不提供响应，由路由器按扩展名加载默认内容。
pub type Callback = Arc<dyn Fn(&mut Session, &Params) -> Option<Response> + Send + Sync>;

/// 错误分类 → 重定向路径 的映射，由应用提供
pub type ErrorRedirect = Arc<dyn Fn(Exception) -> String + Send + Sync>;

/// 授权策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Anonymous,
    Authenticated,
    /// 要求已认证且距最后活动不超过 `timeout_seconds`
    AuthenticatedFresh { timeout_seconds: u64 },
}

/// 按策略检查会话。过期的会话在这里被清除认证状态。
pub fn authorize(policy: Policy, session: &mut Session) -> Result<(), Exception> {
    if let Policy::AuthenticatedFresh { timeout_seconds } = policy {
        if session.is_expired(timeout_seconds) {
            session.expire();
            return Err(Exception::ExpiredSession);
        }
    }
    match policy {
        Policy::Anonymous => Ok(()),
        Policy::Authenticated | Policy::AuthenticatedFresh { .. } => {
            if session.is_authenticated() {
                Ok(())
            } else {
                Err(Exception::NotAuthorized)
            }
        }
    }
}

/// 授权策略 + 应用回调
#[derive(Clone)]
pub struct RouteHandler {
    policy: Policy,
    callback: Callback,
}

impl RouteHandler {
    pub fn new<F>(policy: Policy, callback: F) -> Self
    where
        F: Fn(&mut Session, &Params) -> Option<Response> + Send + Sync + 'static,
    {
        Self {
            policy,
            callback: Arc::new(callback),
        }
    }

    pub fn anonymous<F>(callback: F) -> Self
    where
        F: Fn(&mut Session, &Params) -> Option<Response> + Send + Sync + 'static,
    {
        Self::new(Policy::Anonymous, callback)
    }

    pub fn authenticated<F>(callback: F) -> Self
    where
        F: Fn(&mut Session, &Params) -> Option<Response> + Send + Sync + 'static,
    {
        Self::new(Policy::Authenticated, callback)
    }

    pub fn authenticated_fresh<F>(timeout_seconds: u64, callback: F) -> Self
    where
        F: Fn(&mut Session, &Params) -> Option<Response> + Send + Sync + 'static,
    {
        Self::new(Policy::AuthenticatedFresh { timeout_seconds }, callback)
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// 授权通过时调用回调；授权失败时短路为对应错误页的重定向，回调不会被调用
    pub fn invoke(
        &self,
        session: &mut Session,
        params: &Params,
        on_error: &ErrorRedirect,
    ) -> Option<Response> {
        match authorize(self.policy, session) {
            Ok(()) => (self.callback)(session, params),
            Err(e) => {
                info!("会话 {} 未通过授权检查：{}", session.address(), e);
                let target = on_error(e);
                debug!("重定向到 {}", target);
                Some(Response::redirect(target))
            }
        }
    }
}

impl fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHandler")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

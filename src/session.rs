// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 会话模块
//!
//! 以客户端 IP 地址为身份标识的会话存储。
//!
//! - 首次请求时惰性创建会话，并生成该会话专属的 CSRF 令牌；
//! - 每个会话放在独立的 `Mutex` 中，同一地址的并发请求对会话的修改是串行的；
//! - 会话在进程生命周期内不会被销毁（已知的资源增长限制）。

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use uuid::Uuid;

/// 单个客户端的会话状态
#[derive(Debug, Clone)]
pub struct Session {
    address: IpAddr,
    token: String,
    last_activity: DateTime<Utc>,
    authenticated: bool,
    values: HashMap<String, String>,
}

impl Session {
    /// 创建新会话，生成唯一的 CSRF 令牌并以 `csrf_field` 为键存入会话值表
    pub fn new(address: IpAddr, csrf_field: &str) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        let mut values = HashMap::new();
        values.insert(csrf_field.to_string(), token.clone());
        Self {
            address,
            token,
            last_activity: Utc::now(),
            authenticated: false,
            values,
        }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// 会话的 CSRF 令牌，过期时不会被清除
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    /// 将最后活动时间刷新为当前时间
    pub fn touch(&mut self) {
        self.touch_at(Utc::now());
    }

    pub fn touch_at(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// 当且仅当距最后活动的时间严格大于 `timeout_seconds` 时为真
    pub fn is_expired(&self, timeout_seconds: u64) -> bool {
        self.is_expired_at(Utc::now(), timeout_seconds)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, timeout_seconds: u64) -> bool {
        let max_seconds = i64::MAX / 1000;
        let timeout = i64::try_from(timeout_seconds)
            .unwrap_or(max_seconds)
            .min(max_seconds);
        now.signed_duration_since(self.last_activity) > Duration::seconds(timeout)
    }

    /// 清除认证状态。令牌保留，用户可以在同一会话内重新认证。
    pub fn expire(&mut self) {
        info!("会话 {} 已过期，清除认证状态", self.address);
        self.authenticated = false;
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set_value(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn remove_value(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }
}

/// 共享的会话句柄，整个请求处理期间持有其中的锁
pub type SessionHandle = Arc<Mutex<Session>>;

/// 锁定会话；锁被污染时恢复并继续
pub fn lock_session(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    match handle.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("会话锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

/// 所有会话的唯一持有者
pub struct SessionStore {
    sessions: DashMap<IpAddr, SessionHandle>,
    csrf_field: String,
}

impl SessionStore {
    pub fn new(csrf_field: &str) -> Self {
        Self {
            sessions: DashMap::new(),
            csrf_field: csrf_field.to_string(),
        }
    }

    /// 返回 `address` 的现有会话，不存在时原子地创建一个。
    ///
    /// 同一地址的并发调用只会创建一个会话，所有调用者拿到同一个句柄。
    pub fn resolve(&self, address: IpAddr) -> SessionHandle {
        let entry = self.sessions.entry(address).or_insert_with(|| {
            debug!("为 {} 创建新会话", address);
            Arc::new(Mutex::new(Session::new(address, &self.csrf_field)))
        });
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

//! 连接闸门：限制同时处于"捕获请求"阶段的连接数。
//!
//! 接收循环每轮先取得一个许可，再接收下一个连接。许可在请求被完整读取后立即释放，
//! 而不是等到响应写完，因此慢速的响应生成不会阻塞新连接的接入。

use std::sync::Arc;

use log::debug;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::exception::StartupError;

pub struct ConnectionGate {
    permits: Arc<Semaphore>,
    max_connections: usize,
}

/// 一个准入许可，丢弃或调用 `release` 时归还
#[derive(Debug)]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
}

impl Admission {
    pub fn release(self) {}
}

impl ConnectionGate {
    /// 许可数为 0 时服务器永远无法接收连接，直接在启动阶段报错
    pub fn new(max_connections: usize) -> Result<Self, StartupError> {
        if max_connections == 0 {
            return Err(StartupError::NoPermits);
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    /// 等待一个许可；闸门关闭后返回 `None`
    pub async fn admit(&self) -> Option<Admission> {
        let permit = Arc::clone(&self.permits).acquire_owned().await.ok()?;
        debug!(
            "取得准入许可，剩余 {}/{}",
            self.permits.available_permits(),
            self.max_connections
        );
        Some(Admission { _permit: permit })
    }

    /// 关闭闸门，正在等待和之后的 `admit` 都返回 `None`
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::warn;
use std::fs::File;
use std::io::prelude::*;

use crate::exception::StartupError;
use crate::param::DEFAULT_CSRF_FIELD;

/// 非 GET 请求缺少 CSRF 字段时的处理方式
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CsrfMode {
    /// 记录警告并放行
    Permissive,
    /// 按校验失败拒绝
    Strict,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    www_root: String,
    #[serde(default = "default_pages_dir")]
    pages_dir: String,
    port: u16,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_local")]
    local: bool,
    #[serde(default = "default_max_connections")]
    max_connections: usize,
    #[serde(default = "default_session_timeout_seconds")]
    session_timeout_seconds: u64,
    #[serde(default = "default_csrf_field")]
    csrf_field: String,
    #[serde(default = "default_csrf_mode")]
    csrf_mode: CsrfMode,
    #[serde(default = "default_cache_size")]
    cache_size: usize,
    #[serde(default = "default_max_request_bytes")]
    max_request_bytes: usize,
}

fn default_pages_dir() -> String {
    "pages".to_string()
}

fn default_local() -> bool {
    true
}

fn default_max_connections() -> usize {
    20
}

fn default_session_timeout_seconds() -> u64 {
    600
}

fn default_csrf_field() -> String {
    DEFAULT_CSRF_FIELD.to_string()
}

fn default_csrf_mode() -> CsrfMode {
    CsrfMode::Permissive
}

fn default_cache_size() -> usize {
    64
}

fn default_max_request_bytes() -> usize {
    65536 // 64KB
}

impl Default for Config {
    fn default() -> Self {
        Self {
            www_root: "www".to_string(),
            pages_dir: default_pages_dir(),
            port: 7878,
            worker_threads: num_cpus::get(),
            local: default_local(),
            max_connections: default_max_connections(),
            session_timeout_seconds: default_session_timeout_seconds(),
            csrf_field: default_csrf_field(),
            csrf_mode: default_csrf_mode(),
            cache_size: default_cache_size(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

impl Config {
    pub fn from_toml(filename: &str) -> Result<Self, StartupError> {
        let mut file = File::open(filename)
            .map_err(|e| StartupError::Config(format!("no such file {}: {}", filename, e)))?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|e| StartupError::Config(format!("error reading {}: {}", filename, e)))?;
        Self::from_toml_str(&str_val)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, StartupError> {
        let mut raw_config: Config =
            toml::from_str(content).map_err(|e| StartupError::Config(e.to_string()))?;
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.cache_size == 0 {
            warn!("cache_size被设置为0，但目前尚不支持禁用缓存，因此该值将被改为64。");
            raw_config.cache_size = default_cache_size();
        }
        if raw_config.max_connections == 0 {
            return Err(StartupError::NoPermits);
        }
        if raw_config.csrf_field.is_empty() {
            return Err(StartupError::Config("csrf_field must not be empty".to_string()));
        }
        Ok(raw_config)
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn pages_dir(&self) -> &str {
        &self.pages_dir
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn session_timeout_seconds(&self) -> u64 {
        self.session_timeout_seconds
    }

    pub fn csrf_field(&self) -> &str {
        &self.csrf_field
    }

    pub fn csrf_mode(&self) -> CsrfMode {
        self.csrf_mode
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }
}

// 供嵌入方和测试覆盖个别配置项
impl Config {
    pub fn set_www_root(&mut self, www_root: &str) -> &mut Self {
        self.www_root = www_root.to_string();
        self
    }

    pub fn set_max_connections(&mut self, max_connections: usize) -> &mut Self {
        self.max_connections = max_connections;
        self
    }

    pub fn set_session_timeout_seconds(&mut self, seconds: u64) -> &mut Self {
        self.session_timeout_seconds = seconds;
        self
    }

    pub fn set_csrf_mode(&mut self, mode: CsrfMode) -> &mut Self {
        self.csrf_mode = mode;
        self
    }
}

//! 可插拔的内容来源：给定物理路径，返回文件字节。
//!
//! 路由器只依赖 `ContentSource`，默认实现 `FsSource` 从文件系统读取并带有 LRU 缓存。

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use bytes::Bytes;
use log::{debug, warn};

use crate::cache::ContentCache;

/// "按路径加载字节" 的能力
pub trait ContentSource: Send + Sync {
    /// 读取 `path` 的全部内容。文件不存在时返回 `io::ErrorKind::NotFound`。
    fn load(&self, path: &Path) -> io::Result<Bytes>;
}

/// 基于文件系统的内容来源
pub struct FsSource {
    cache: Mutex<ContentCache>,
}

impl FsSource {
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache: Mutex::new(ContentCache::from_capacity(cache_size)),
        }
    }
}

impl ContentSource for FsSource {
    fn load(&self, path: &Path) -> io::Result<Bytes> {
        let metadata = fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"));
        }
        let modified = metadata.modified()?;
        let key = path.to_string_lossy();

        let mut cache = match self.cache.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("内容缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        if let Some(bytes) = cache.find(&key, modified) {
            debug!("缓存命中：{}", key);
            return Ok(bytes);
        }

        let bytes = Bytes::from(fs::read(path)?);
        debug!("缓存未命中，已从磁盘读取 {} ({} bytes)", key, bytes.len());
        cache.push(&key, bytes.clone(), modified);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_fs_source_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("site.css");
        fs::File::create(&path)
            .unwrap()
            .write_all(b"h1 { margin: 0; }")
            .unwrap();

        let source = FsSource::new(4);
        assert_eq!(source.load(&path).unwrap(), Bytes::from("h1 { margin: 0; }"));
        // 第二次读取命中缓存，内容不变
        assert_eq!(source.load(&path).unwrap(), Bytes::from("h1 { margin: 0; }"));
    }

    #[test]
    fn test_fs_source_missing_file() {
        let dir = tempdir().unwrap();
        let source = FsSource::new(4);
        let err = source.load(&dir.path().join("missing.png")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_fs_source_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let source = FsSource::new(4);
        let err = source.load(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

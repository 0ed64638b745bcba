//! 行数据缓存
//!
//! 单槽缓存: 每类数据源记住最近一次解析的文件, 路径变化即失效.
//! 只是避免每次执行重复解析的性能优化, 不承担正确性职责

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::error::Error;

/// 按源文件路径缓存解析后的行
#[derive(Default)]
pub struct RowCache {
    path: Option<PathBuf>,
    rows: Arc<Vec<Vec<String>>>,
}

impl RowCache {
    /// 命中时直接返回缓存行, 未命中时调用 loader 解析并替换缓存
    pub fn get_or_load<F>(
        cache: &Mutex<RowCache>,
        path: &Path,
        loader: F,
    ) -> Result<Arc<Vec<Vec<String>>>, Error>
    where
        F: FnOnce(&Path) -> Result<Vec<Vec<String>>, Error>,
    {
        let mut guard = cache.lock().map_err(|e| Error::LockError(e.to_string()))?;
        if guard.path.as_deref() != Some(path) {
            let rows = loader(path)?;
            guard.rows = Arc::new(rows);
            guard.path = Some(path.to_path_buf());
        }
        Ok(guard.rows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hits_until_path_changes() -> anyhow::Result<()> {
        let cache = Mutex::new(RowCache::default());
        let mut loads = 0;

        for _ in 0..3 {
            let rows = RowCache::get_or_load(&cache, Path::new("a.csv"), |_| {
                loads += 1;
                Ok(vec![vec!["a".to_string()]])
            })?;
            assert_eq!(rows.len(), 1);
        }
        assert_eq!(loads, 1);

        // 路径变化后重新解析
        RowCache::get_or_load(&cache, Path::new("b.csv"), |_| {
            loads += 1;
            Ok(vec![])
        })?;
        assert_eq!(loads, 2);
        Ok(())
    }
}

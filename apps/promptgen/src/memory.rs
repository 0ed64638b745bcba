//! 会话记忆
//!
//! 按模型名分区的去重记忆. 控制线程创建并 Arc 共享,
//! 约定生成期间每个分区只由对应的工作线程写入;
//! clear 只在两次运行之间由控制线程调用

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use crate::record::GenerationRecord;

#[derive(Default)]
pub struct GenerationMemory {
    inner: Mutex<HashMap<String, Vec<GenerationRecord>>>,
}

impl GenerationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<GenerationRecord>>> {
        // 工作线程只在持锁期间做内存操作, 中毒时数据仍然可用
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 指定分区是否已有结构相等的记录
    pub fn contains(&self, model_key: &str, record: &GenerationRecord) -> bool {
        self.lock()
            .get(model_key)
            .is_some_and(|records| records.contains(record))
    }

    /// 追加记录, 调用方负责先查重
    pub fn push(&self, model_key: &str, record: GenerationRecord) {
        self.lock()
            .entry(model_key.to_string())
            .or_default()
            .push(record);
    }

    /// 分区记录快照, 保持插入顺序
    pub fn records(&self, model_key: &str) -> Vec<GenerationRecord> {
        self.lock().get(model_key).cloned().unwrap_or_default()
    }

    /// 清空全部分区
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().values().all(|records| records.is_empty())
    }

    /// 全部分区快照, 用于界面展示
    pub fn snapshot(&self) -> Vec<(String, Vec<GenerationRecord>)> {
        let mut entries: Vec<(String, Vec<GenerationRecord>)> = self
            .lock()
            .iter()
            .map(|(key, records)| (key.clone(), records.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_per_partition() {
        let memory = GenerationMemory::new();
        let record = GenerationRecord::new("A", "B", "C");
        memory.push("model-1", record.clone());

        assert!(memory.contains("model-1", &record));
        assert!(!memory.contains("model-2", &record));
    }

    #[test]
    fn test_records_keep_insertion_order() {
        let memory = GenerationMemory::new();
        memory.push("m", GenerationRecord::new("first", "", ""));
        memory.push("m", GenerationRecord::new("second", "", ""));

        let titles: Vec<String> = memory
            .records("m")
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[test]
    fn test_clear_empties_all_partitions() {
        let memory = GenerationMemory::new();
        memory.push("a", GenerationRecord::new("x", "", ""));
        memory.push("b", GenerationRecord::new("y", "", ""));
        memory.clear();
        assert!(memory.is_empty());
    }
}

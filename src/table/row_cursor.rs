//! 行游标
//!
//! 在 [start_index, end_index] 闭区间内按照循环模式选择下一行索引.
//! increment 模式把当前位置写入源文件旁的状态文件, 跨调用/跨进程续循环;
//! disabled 与 random 模式无状态.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use rand::Rng;
use strum_macros::{Display, EnumString};

use crate::error::Error;

/// 循环模式
///
/// "disabled", "random", "increment"
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoopMode {
    /// 固定返回起始索引
    Disabled,
    /// 在区间内均匀随机
    Random,
    /// 按步长递增, 越界时回绕到起始索引
    Increment,
}

impl LoopMode {
    /// INPUT_TYPES 的候选列表
    pub fn choices() -> Vec<String> {
        vec![
            LoopMode::Disabled.to_string(),
            LoopMode::Random.to_string(),
            LoopMode::Increment.to_string(),
        ]
    }
}

/// 行游标
///
/// 构造时完成范围归一化, 之后 select 保证返回值落在 [start, end] 内
pub struct RowCursor {
    source: PathBuf,
    mode: LoopMode,
    start: usize,
    end: usize,
    step: usize,
}

impl RowCursor {
    /// 创建游标并归一化范围
    ///
    /// 归一化顺序: start 钳制到 >= 0, end 钳制到 total_rows - 1,
    /// 倒置时交换两端, 交换后再次钳制 end.
    /// 空数据源直接报错, 不再让 end 回卷成 -1
    pub fn new(
        source: &Path,
        mode: LoopMode,
        start_index: i64,
        end_index: i64,
        step_size: i64,
        total_rows: usize,
    ) -> Result<Self, Error> {
        if total_rows == 0 {
            return Err(Error::EmptySource(source.display().to_string()));
        }
        if step_size < 1 {
            return Err(Error::InvalidParameter(format!(
                "step_size must be >= 1, got {step_size}"
            )));
        }

        let last = total_rows - 1;
        let mut start = start_index.max(0) as usize;
        let mut end = (end_index.max(0) as usize).min(last);
        if end < start {
            std::mem::swap(&mut start, &mut end);
            end = end.min(last);
        }

        Ok(Self {
            source: source.to_path_buf(),
            mode,
            start,
            end,
            step: step_size as usize,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// 选择本次调用使用的行索引
    ///
    /// increment 模式返回读到的当前位置, 随后才推进并落盘
    pub fn select(&self) -> Result<usize, Error> {
        let chosen = match self.mode {
            LoopMode::Disabled => self.start,
            LoopMode::Random => rand::rng().random_range(self.start..=self.end),
            LoopMode::Increment => {
                let state_file = self.state_file();
                let current = self.read_state(&state_file).unwrap_or(self.start);
                let candidate = current + self.step;
                let next = if candidate > self.end {
                    self.start
                } else {
                    candidate
                };
                self.write_state(&state_file, next)?;
                current
            }
        };

        debug!("mode: {}, chosen index: {}", self.mode, chosen);
        Ok(chosen)
    }

    /// 状态文件路径
    ///
    /// 由数据源路径和全部循环参数推导, 任一参数变化都会切换到独立的状态文件
    pub fn state_file(&self) -> PathBuf {
        let stem = self.source.with_extension("");
        PathBuf::from(format!(
            "{}_state_{}_{}_{}_{}.txt",
            stem.display(),
            self.mode,
            self.start,
            self.end,
            self.step
        ))
    }

    /// 读取持久化的当前位置
    ///
    /// 文件缺失/内容不可解析/越界都按 "无历史状态" 处理
    fn read_state(&self, state_file: &Path) -> Option<usize> {
        let content = fs::read_to_string(state_file).ok()?;
        match content.trim().parse::<usize>() {
            Ok(v) if v >= self.start && v <= self.end => Some(v),
            Ok(v) => {
                warn!("stale loop state {v} outside [{}, {}]", self.start, self.end);
                None
            }
            Err(_) => None,
        }
    }

    fn write_state(&self, state_file: &Path, index: usize) -> Result<(), Error> {
        fs::write(state_file, index.to_string())?;
        Ok(())
    }
}

/// 去掉行文本两端的空格与引号 (ASCII 引号与中英文弯引号)
pub fn trim_quotes(text: &str) -> &str {
    text.trim_matches(|c: char| c == ' ' || c == '"' || c == '\u{201c}' || c == '\u{201d}')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(dir: &Path, mode: LoopMode, start: i64, end: i64, step: i64, total: usize) -> RowCursor {
        RowCursor::new(&dir.join("rows.csv"), mode, start, end, step, total).unwrap()
    }

    #[test]
    fn test_normalize_clamps_and_swaps() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // end 超出行数时钳制到最后一行
        let c = cursor(dir.path(), LoopMode::Disabled, 2, 100, 1, 10);
        assert_eq!((c.start(), c.end()), (2, 9));

        // start 为负时钳制到 0
        let c = cursor(dir.path(), LoopMode::Disabled, -5, 3, 1, 10);
        assert_eq!((c.start(), c.end()), (0, 3));

        // 倒置时交换
        let c = cursor(dir.path(), LoopMode::Disabled, 7, 2, 1, 10);
        assert_eq!((c.start(), c.end()), (2, 7));

        // 交换后仍然不允许越过最后一行
        let c = cursor(dir.path(), LoopMode::Disabled, 50, 2, 1, 10);
        assert_eq!((c.start(), c.end()), (2, 9));
        Ok(())
    }

    #[test]
    fn test_empty_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = RowCursor::new(&dir.path().join("rows.csv"), LoopMode::Disabled, 0, 10, 1, 0);
        assert!(matches!(result, Err(Error::EmptySource(_))));
    }

    #[test]
    fn test_disabled_always_returns_start() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let c = cursor(dir.path(), LoopMode::Disabled, 3, 8, 2, 10);
        for _ in 0..5 {
            assert_eq!(c.select()?, 3);
        }
        Ok(())
    }

    #[test]
    fn test_random_stays_in_range() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let c = cursor(dir.path(), LoopMode::Random, 2, 5, 1, 10);
        for _ in 0..50 {
            let index = c.select()?;
            assert!((2..=5).contains(&index));
        }
        Ok(())
    }

    #[test]
    fn test_increment_wraps_with_period() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // 5 行, [1, 3], 步长 1: 序列 1,2,3,1,2
        let c = cursor(dir.path(), LoopMode::Increment, 1, 3, 1, 5);
        let visited: Vec<usize> = (0..5).map(|_| c.select().unwrap()).collect();
        assert_eq!(visited, vec![1, 2, 3, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_increment_step_skips_and_wraps_early() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // [0, 5], 步长 2: 0,2,4 后 6 > 5 回绕, 周期 3
        let c = cursor(dir.path(), LoopMode::Increment, 0, 5, 2, 10);
        let visited: Vec<usize> = (0..7).map(|_| c.select().unwrap()).collect();
        assert_eq!(visited, vec![0, 2, 4, 0, 2, 4, 0]);
        Ok(())
    }

    #[test]
    fn test_two_cursors_share_one_sequence() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // 相同配置的两个实例共享同一状态文件, 串行调用时序列单调续进
        let a = cursor(dir.path(), LoopMode::Increment, 0, 2, 1, 5);
        let b = cursor(dir.path(), LoopMode::Increment, 0, 2, 1, 5);
        assert_eq!(a.select()?, 0);
        assert_eq!(b.select()?, 1);
        assert_eq!(a.select()?, 2);
        assert_eq!(b.select()?, 0);
        Ok(())
    }

    #[test]
    fn test_state_key_depends_on_parameters() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let a = cursor(dir.path(), LoopMode::Increment, 0, 4, 1, 5);
        let b = cursor(dir.path(), LoopMode::Increment, 0, 4, 2, 5);
        assert_ne!(a.state_file(), b.state_file());
        // 不同配置彼此独立推进
        assert_eq!(a.select()?, 0);
        assert_eq!(a.select()?, 1);
        assert_eq!(b.select()?, 0);
        assert_eq!(b.select()?, 2);
        Ok(())
    }

    #[test]
    fn test_unparsable_state_falls_back_to_start() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let c = cursor(dir.path(), LoopMode::Increment, 1, 3, 1, 5);
        fs::write(c.state_file(), "not a number")?;
        assert_eq!(c.select()?, 1);
        // 越界的历史值同样回退到 start
        fs::write(c.state_file(), "42")?;
        assert_eq!(c.select()?, 1);
        Ok(())
    }

    #[test]
    fn test_trim_quotes() {
        assert_eq!(trim_quotes("\"hello\""), "hello");
        assert_eq!(trim_quotes(" \u{201c}smart\u{201d} "), "smart");
        assert_eq!(trim_quotes("no quotes"), "no quotes");
        assert_eq!(trim_quotes("in\"ner"), "in\"ner");
    }
}

//! CSV 导出
//!
//! 表头固定为 Title,Description,Style; append 模式只在文件不存在时写表头

use std::{fs, path::Path};

use crate::{error::GenError, record::GenerationRecord};

/// 落盘模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// 追加到已有文件
    Append,
    /// 截断重写
    Overwrite,
}

/// 把记录写入 CSV
pub fn save_records(
    path: &Path,
    records: &[GenerationRecord],
    mode: SaveMode,
) -> Result<(), GenError> {
    if records.is_empty() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let (file, write_header) = match mode {
        SaveMode::Overwrite => (fs::File::create(path)?, true),
        SaveMode::Append => {
            let exists = path.is_file();
            let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            (file, !exists)
        }
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<GenerationRecord> {
        vec![GenerationRecord::new("A title", "A description", "macro")]
    }

    #[test]
    fn test_append_writes_header_once() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("prompts.csv");

        save_records(&path, &records(), SaveMode::Append)?;
        save_records(&path, &records(), SaveMode::Append)?;

        let content = fs::read_to_string(&path)?;
        let headers = content
            .lines()
            .filter(|line| *line == "Title,Description,Style")
            .count();
        assert_eq!(headers, 1);
        assert_eq!(content.lines().count(), 3);
        Ok(())
    }

    #[test]
    fn test_overwrite_truncates_and_writes_header() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("prompts.csv");

        save_records(&path, &records(), SaveMode::Append)?;
        save_records(&path, &records(), SaveMode::Overwrite)?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(content.lines().count(), 2);
        assert!(content.starts_with("Title,Description,Style"));
        Ok(())
    }

    #[test]
    fn test_fields_with_commas_are_quoted() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("prompts.csv");

        let records = vec![GenerationRecord::new("a, b", "c", "d")];
        save_records(&path, &records, SaveMode::Overwrite)?;

        let content = fs::read_to_string(&path)?;
        assert!(content.contains("\"a, b\""));
        Ok(())
    }

    #[test]
    fn test_parent_directories_are_created() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/deep/prompts.csv");
        save_records(&path, &records(), SaveMode::Append)?;
        assert!(path.is_file());
        Ok(())
    }

    #[test]
    fn test_empty_batch_writes_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("prompts.csv");
        save_records(&path, &[], SaveMode::Append)?;
        assert!(!path.exists());
        Ok(())
    }
}

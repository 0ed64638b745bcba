//! Excel 工作簿读取
//!
//! 共用的加载逻辑: 第一个工作表的全部单元格转成字符串行

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::Error;

const EXCEL_EXTENSIONS: [&str; 3] = ["xlsx", "xlsm", "xls"];

/// 读取 Excel 文件第一个工作表的全部行
pub fn load_excel_rows(path: &Path) -> Result<Vec<Vec<String>>, Error> {
    if !path.is_file() {
        return Err(Error::NotFound(path.display().to_string()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if !EXCEL_EXTENSIONS.contains(&ext.as_str()) {
        return Err(Error::Unsupported(format!(
            "{ext}: only {} are supported",
            EXCEL_EXTENSIONS.join("/")
        )));
    }

    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::EmptySource(path.display().to_string()))??;

    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_excel_rows(&dir.path().join("missing.xlsx"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_wrong_extension_is_unsupported() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("table.txt");
        std::fs::write(&path, "not a workbook")?;
        let result = load_excel_rows(&path);
        assert!(matches!(result, Err(Error::Unsupported(_))));
        Ok(())
    }
}
